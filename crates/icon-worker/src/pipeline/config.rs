use crate::config::WorkerConfig;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Key prefix for uploaded textures, without a trailing slash.
    pub texture_prefix: String,
    /// Seeds the fallback generator with `seed + file_id` when set.
    pub rng_seed: Option<u64>,
}

impl PipelineConfig {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            texture_prefix: config.worker.texture_prefix.clone(),
            rng_seed: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            texture_prefix: "icons".to_string(),
            rng_seed: None,
        }
    }
}
