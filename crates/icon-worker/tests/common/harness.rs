//! Test harness for running the worker against in-memory backends.
//!
//! The `TestHarness` struct wires a `Controller` to:
//! - `InMemoryFileStore` for the `files` table
//! - `InMemoryBlobStore` for sources and textures
//! - `InMemoryJobQueue` / `InMemoryNotifier` for the queue and channel

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use icon_worker::db::{FileRecord, InMemoryFileStore};
use icon_worker::pipeline::NoopReporter;
use icon_worker::queue::{InMemoryJobQueue, InMemoryNotifier, JobQueue};
use icon_worker::storage::InMemoryBlobStore;
use icon_worker::worker::JobDescriptor;
use icon_worker::{Controller, ControllerOptions, Pipeline, PipelineConfig, TickOutcome};

pub const TEST_POP_TIMEOUT: Duration = Duration::from_millis(20);

pub struct TestHarness {
    pub files: Arc<InMemoryFileStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub queue: Arc<InMemoryJobQueue>,
    pub notifier: Arc<InMemoryNotifier>,
    pub controller: Controller,
}

impl TestHarness {
    /// Destructive delivery, no backoff, seeded fallback RNG.
    pub fn new() -> Self {
        Self::with_queue(InMemoryJobQueue::destructive())
    }

    pub fn claim(visibility_timeout: Duration) -> Self {
        Self::with_queue(InMemoryJobQueue::claim(visibility_timeout))
    }

    pub fn with_queue(queue: InMemoryJobQueue) -> Self {
        Self::build(
            queue,
            ControllerOptions {
                pop_timeout: TEST_POP_TIMEOUT,
                error_backoff: Duration::ZERO,
            },
        )
    }

    pub fn build(queue: InMemoryJobQueue, options: ControllerOptions) -> Self {
        let files = Arc::new(InMemoryFileStore::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let queue = Arc::new(queue);
        let notifier = Arc::new(InMemoryNotifier::new());

        let pipeline = Pipeline::new(
            files.clone(),
            blobs.clone(),
            queue.clone(),
            notifier.clone(),
            PipelineConfig {
                texture_prefix: "icons".to_string(),
                rng_seed: Some(1),
            },
        );
        let controller = Controller::new(Arc::new(pipeline), queue.clone(), options)
            .with_reporter(Arc::new(NoopReporter));

        Self {
            files,
            blobs,
            queue,
            notifier,
            controller,
        }
    }

    /// Seeds a record and its source object.
    pub fn add_file(&self, record: FileRecord, source: Vec<u8>) {
        if let Some(path) = &record.source_path {
            self.blobs.insert(path.clone(), source);
        }
        self.files.insert(record);
    }

    pub async fn enqueue(&self, file_id: i32) {
        self.queue
            .push(&JobDescriptor::new(file_id))
            .await
            .expect("Failed to enqueue job");
    }

    pub async fn tick(&self) -> TickOutcome {
        self.controller.run_once().await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
