//! Broadcasting of pipeline stage transitions to in-process subscribers.

pub mod job_progress;

pub use job_progress::{JobStage, StageBroadcaster, StageEvent};
