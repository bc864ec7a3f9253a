use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::sync::watch;

use crate::config::WorkerConfig;
use crate::pipeline::progress::{LogReporter, StageReporter};
use crate::pipeline::{JobOutcome, Pipeline};
use crate::queue::JobQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Upper bound on one blocking pop.
    pub pop_timeout: Duration,
    /// Pause after a failed tick.
    pub error_backoff: Duration,
}

impl ControllerOptions {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            pop_timeout: config.worker.pop_timeout,
            error_backoff: config.worker.error_backoff,
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_secs(5),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// What one polling cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The pop timed out with nothing to do.
    Idle,
    Processed(JobOutcome),
    /// The pop, the payload or the attempt failed. Backoff applies.
    Failed,
}

/// Counters accumulated by [`Controller::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub polls: u64,
    pub idle_polls: u64,
    pub completed: u64,
    pub dropped: u64,
    pub failed: u64,
    /// Completed jobs whose event could not be published.
    pub notify_failures: u64,
}

impl WorkerStats {
    pub fn record(&mut self, tick: &TickOutcome) {
        self.polls += 1;
        match tick {
            TickOutcome::Idle => self.idle_polls += 1,
            TickOutcome::Processed(JobOutcome::Completed { notified, .. }) => {
                self.completed += 1;
                if !notified {
                    self.notify_failures += 1;
                }
            }
            TickOutcome::Processed(JobOutcome::Dropped { .. }) => self.dropped += 1,
            TickOutcome::Failed => self.failed += 1,
        }
    }
}

/// Sequential polling loop: one descriptor at a time, fixed backoff after failures.
pub struct Controller {
    pipeline: Arc<Pipeline>,
    queue: Arc<dyn JobQueue>,
    options: ControllerOptions,
    reporter: Arc<dyn StageReporter>,
}

impl Controller {
    pub fn new(
        pipeline: Arc<Pipeline>,
        queue: Arc<dyn JobQueue>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            pipeline,
            queue,
            options,
            reporter: Arc::new(LogReporter),
        }
    }

    /// Replaces the default [`LogReporter`].
    pub fn with_reporter(mut self, reporter: Arc<dyn StageReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Pops at most one descriptor and runs it to completion.
    pub async fn run_once(&self) -> TickOutcome {
        let delivery = match self.queue.pop(self.options.pop_timeout).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                trace!("No job within {:?}", self.options.pop_timeout);
                return TickOutcome::Idle;
            }
            Err(e) => {
                error!("Failed to pop job: {}", e);
                return TickOutcome::Failed;
            }
        };

        match self.pipeline.run(&delivery, self.reporter.as_ref()).await {
            Ok(outcome) => TickOutcome::Processed(outcome),
            Err(e) => {
                error!("Job aborted at {}: {}", e.stage(), e);
                TickOutcome::Failed
            }
        }
    }

    /// Loops until `shutdown` becomes `true`.
    ///
    /// The flag is checked before each pop, so a job that has started always
    /// finishes. A closed channel counts as shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        info!(
            "Worker started ({} delivery, pop timeout {:?}, backoff {:?})",
            self.queue.delivery_mode(),
            self.options.pop_timeout,
            self.options.error_backoff
        );

        let mut stopping = *shutdown.borrow();
        while !stopping {
            let tick = self.run_once().await;
            stats.record(&tick);

            if tick == TickOutcome::Failed && !self.options.error_backoff.is_zero() {
                debug!("Backing off for {:?}", self.options.error_backoff);
                tokio::select! {
                    _ = tokio::time::sleep(self.options.error_backoff) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            warn!("Shutdown channel closed");
                            stopping = true;
                        }
                    }
                }
            }

            if shutdown.has_changed().is_err() {
                stopping = true;
            }
            stopping = stopping || *shutdown.borrow_and_update();
        }

        info!(
            "Worker stopped after {} polls: {} completed, {} dropped, {} failed, {} notification failures",
            stats.polls, stats.completed, stats.dropped, stats.failed, stats.notify_failures
        );
        stats
    }
}
