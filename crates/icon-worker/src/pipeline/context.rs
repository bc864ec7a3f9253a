use crate::queue::Delivery;

/// State carried between the stages of one attempt.
pub struct PipelineContext<'a> {
    pub delivery: &'a Delivery,
    pub file_id: i32,

    // Set by lookup
    pub source_path: Option<String>,

    // Derived from file_id, fixed for every attempt
    pub texture_path: String,
}

impl<'a> PipelineContext<'a> {
    pub fn new(delivery: &'a Delivery, file_id: i32, texture_path: String) -> Self {
        Self {
            delivery,
            file_id,
            source_path: None,
            texture_path,
        }
    }
}
