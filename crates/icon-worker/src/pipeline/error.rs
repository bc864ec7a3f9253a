use thiserror::Error;

use crate::broadcast::JobStage;
use crate::db::DatabaseError;
use crate::storage::StorageError;

/// Why an attempt aborted. Every variant maps to the stage it failed in.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed job descriptor '{payload}': {source}")]
    MalformedDescriptor {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Lookup of file {file_id} failed: {source}")]
    Lookup {
        file_id: i32,
        #[source]
        source: DatabaseError,
    },

    #[error("Marking file {file_id} as processing failed: {source}")]
    MarkProcessing {
        file_id: i32,
        #[source]
        source: DatabaseError,
    },

    #[error("Download of '{key}' for file {file_id} failed: {source}")]
    Download {
        file_id: i32,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Texture synthesis for file {file_id} failed: {reason}")]
    Synthesis { file_id: i32, reason: String },

    #[error("Upload of '{key}' for file {file_id} failed: {source}")]
    Upload {
        file_id: i32,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Recording completion of file {file_id} failed: {source}")]
    Record {
        file_id: i32,
        #[source]
        source: DatabaseError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> JobStage {
        match self {
            PipelineError::MalformedDescriptor { .. } => JobStage::Dequeued,
            PipelineError::Lookup { .. } => JobStage::LookingUp,
            PipelineError::MarkProcessing { .. } => JobStage::MarkingProcessing,
            PipelineError::Download { .. } => JobStage::Downloading,
            PipelineError::Synthesis { .. } => JobStage::Synthesizing,
            PipelineError::Upload { .. } => JobStage::Uploading,
            PipelineError::Record { .. } => JobStage::Recording,
        }
    }

    /// `None` when the payload never decoded.
    pub fn file_id(&self) -> Option<i32> {
        match self {
            PipelineError::MalformedDescriptor { .. } => None,
            PipelineError::Lookup { file_id, .. }
            | PipelineError::MarkProcessing { file_id, .. }
            | PipelineError::Download { file_id, .. }
            | PipelineError::Synthesis { file_id, .. }
            | PipelineError::Upload { file_id, .. }
            | PipelineError::Record { file_id, .. } => Some(*file_id),
        }
    }
}
