//! Stage broadcaster for observing jobs as they move through the pipeline.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Observable state of one attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Dequeued,
    LookingUp,
    MarkingProcessing,
    Downloading,
    Synthesizing,
    Uploading,
    Recording,
    Publishing,
    Done,
    Aborted,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Dequeued => "dequeued",
            JobStage::LookingUp => "looking_up",
            JobStage::MarkingProcessing => "marking_processing",
            JobStage::Downloading => "downloading",
            JobStage::Synthesizing => "synthesizing",
            JobStage::Uploading => "uploading",
            JobStage::Recording => "recording",
            JobStage::Publishing => "publishing",
            JobStage::Done => "done",
            JobStage::Aborted => "aborted",
        }
    }

    /// `Done` and `Aborted` end an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Done | JobStage::Aborted)
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    /// `None` while the descriptor has not been decoded yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i32>,
    pub stage: JobStage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl StageEvent {
    pub fn new(file_id: Option<i32>, stage: JobStage, message: impl Into<String>) -> Self {
        Self {
            file_id,
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Fans stage events out to any number of subscribers.
#[derive(Clone)]
pub struct StageBroadcaster {
    sender: Arc<broadcast::Sender<StageEvent>>,
}

impl StageBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: StageEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StageBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
