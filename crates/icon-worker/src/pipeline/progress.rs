use tracing::{debug, warn};

use crate::broadcast::job_progress::{JobStage, StageBroadcaster, StageEvent};

/// Receives every stage transition of every attempt.
pub trait StageReporter: Send + Sync {
    fn report(&self, file_id: Option<i32>, stage: JobStage, message: &str);
}

/// Discards everything. Used by unit tests.
pub struct NoopReporter;

impl StageReporter for NoopReporter {
    fn report(&self, _file_id: Option<i32>, _stage: JobStage, _message: &str) {}
}

/// Emits transitions as `tracing` events at debug level; aborts at warn.
pub struct LogReporter;

impl StageReporter for LogReporter {
    fn report(&self, file_id: Option<i32>, stage: JobStage, message: &str) {
        match stage {
            JobStage::Aborted => warn!(?file_id, %stage, "{}", message),
            _ => debug!(?file_id, %stage, "{}", message),
        }
    }
}

/// Bridges pipeline transitions onto a [`StageBroadcaster`].
pub struct BroadcastReporter {
    broadcaster: StageBroadcaster,
}

impl BroadcastReporter {
    pub fn new(broadcaster: StageBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl StageReporter for BroadcastReporter {
    fn report(&self, file_id: Option<i32>, stage: JobStage, message: &str) {
        self.broadcaster.send(StageEvent::new(file_id, stage, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reporter_forwards_events() {
        let broadcaster = StageBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let reporter = BroadcastReporter::new(broadcaster);

        reporter.report(Some(3), JobStage::Uploading, "icons/3_texture.png");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.file_id, Some(3));
        assert_eq!(event.stage, JobStage::Uploading);
        assert_eq!(event.message, "icons/3_texture.png");
    }
}
