use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, info_span, warn, Instrument};

use crate::broadcast::job_progress::JobStage;
use crate::db::FileStore;
use crate::queue::{Delivery, JobQueue, Notifier};
use crate::storage::BlobStore;
use crate::texture::{self, TEXTURE_CONTENT_TYPE};
use crate::worker::job::{texture_path, CompletionEvent, JobDescriptor};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::StageReporter;

/// Why an attempt ended without producing a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    RecordNotFound,
    NoSourcePath,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::RecordNotFound => f.write_str("no file record"),
            DropReason::NoSourcePath => f.write_str("file record has no source path"),
        }
    }
}

/// Result of an attempt that did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        file_id: i32,
        texture_path: String,
        /// `false` when the completion event could not be published.
        notified: bool,
    },
    Dropped {
        file_id: i32,
        reason: DropReason,
    },
}

/// Runs one descriptor through lookup, download, synthesis, upload, recording
/// and notification.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    files: Arc<dyn FileStore>,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn JobQueue>,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        files: Arc<dyn FileStore>,
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn JobQueue>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            config: Arc::new(config),
            files,
            blobs,
            queue,
            notifier,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline for one delivery.
    ///
    /// Claimed deliveries are acknowledged once the record is COMPLETE, when
    /// the job is dropped, or when the payload is malformed. An aborted
    /// attempt leaves its lease in place.
    pub async fn run(
        &self,
        delivery: &Delivery,
        progress: &dyn StageReporter,
    ) -> Result<JobOutcome, PipelineError> {
        let job = match JobDescriptor::parse(&delivery.payload) {
            Ok(job) => job,
            Err(source) => {
                progress.report(None, JobStage::Aborted, "malformed job descriptor");
                self.acknowledge(delivery).await;
                return Err(PipelineError::MalformedDescriptor {
                    payload: delivery.payload.clone(),
                    source,
                });
            }
        };

        let file_id = job.file_id;
        let ctx = PipelineContext::new(
            delivery,
            file_id,
            texture_path(&self.config.texture_prefix, file_id),
        );

        let result = self
            .run_job(ctx, progress)
            .instrument(info_span!("pipeline", file_id))
            .await;

        if let Err(ref e) = result {
            progress.report(Some(file_id), JobStage::Aborted, &e.to_string());
        }
        result
    }

    async fn run_job(
        &self,
        mut ctx: PipelineContext<'_>,
        progress: &dyn StageReporter,
    ) -> Result<JobOutcome, PipelineError> {
        let file_id = ctx.file_id;
        info!("Processing job");
        progress.report(Some(file_id), JobStage::Dequeued, &ctx.delivery.payload);

        // Step 1: Look up the source
        progress.report(Some(file_id), JobStage::LookingUp, "Looking up file record...");
        if let Some(reason) = self
            .step_lookup(&mut ctx)
            .instrument(info_span!("lookup"))
            .await?
        {
            warn!(%reason, "Dropping job");
            self.acknowledge(ctx.delivery).await;
            progress.report(Some(file_id), JobStage::Done, &reason.to_string());
            return Ok(JobOutcome::Dropped { file_id, reason });
        }

        // Step 2: Advertise that work has started
        progress.report(
            Some(file_id),
            JobStage::MarkingProcessing,
            "Marking file as processing...",
        );
        self.files
            .mark_processing(file_id)
            .instrument(info_span!("mark_processing"))
            .await
            .map_err(|source| PipelineError::MarkProcessing { file_id, source })?;

        // Step 3: Download
        let source_path = ctx.source_path.clone().unwrap_or_default();
        progress.report(Some(file_id), JobStage::Downloading, &source_path);
        let source = self
            .blobs
            .get(&source_path)
            .instrument(info_span!("download", key = %source_path))
            .await
            .map_err(|source| PipelineError::Download {
                file_id,
                key: source_path.clone(),
                source,
            })?;

        // Step 4: Synthesize; the source buffer is released here
        progress.report(Some(file_id), JobStage::Synthesizing, "Synthesizing texture...");
        let texture = self
            .step_synthesize(file_id, source)
            .instrument(info_span!("synthesize"))
            .await?;

        // Step 5: Upload
        progress.report(Some(file_id), JobStage::Uploading, &ctx.texture_path);
        self.blobs
            .put(&ctx.texture_path, Bytes::from(texture), TEXTURE_CONTENT_TYPE)
            .instrument(info_span!("upload", key = %ctx.texture_path))
            .await
            .map_err(|source| PipelineError::Upload {
                file_id,
                key: ctx.texture_path.clone(),
                source,
            })?;

        // Step 6: Record COMPLETE and the texture path together
        progress.report(Some(file_id), JobStage::Recording, "Recording completion...");
        self.files
            .mark_complete(file_id, &ctx.texture_path)
            .instrument(info_span!("record"))
            .await
            .map_err(|source| PipelineError::Record { file_id, source })?;

        self.acknowledge(ctx.delivery).await;

        // Step 7: Notify, best effort
        progress.report(Some(file_id), JobStage::Publishing, "Publishing completion event...");
        let notified = self
            .step_publish(&ctx)
            .instrument(info_span!("publish"))
            .await;

        info!(texture_path = %ctx.texture_path, notified, "Job complete");
        progress.report(Some(file_id), JobStage::Done, &ctx.texture_path);

        Ok(JobOutcome::Completed {
            file_id,
            texture_path: ctx.texture_path,
            notified,
        })
    }

    async fn step_lookup(
        &self,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<Option<DropReason>, PipelineError> {
        let file_id = ctx.file_id;
        let record = self
            .files
            .find(file_id)
            .await
            .map_err(|source| PipelineError::Lookup { file_id, source })?;

        let Some(record) = record else {
            return Ok(Some(DropReason::RecordNotFound));
        };

        match record.source_path {
            Some(path) if !path.is_empty() => {
                ctx.source_path = Some(path);
                Ok(None)
            }
            _ => Ok(Some(DropReason::NoSourcePath)),
        }
    }

    async fn step_synthesize(&self, file_id: i32, source: Bytes) -> Result<Vec<u8>, PipelineError> {
        let seed = self
            .config
            .rng_seed
            .map(|seed| seed.wrapping_add_signed(i64::from(file_id)));

        let encoded = tokio::task::spawn_blocking(move || match seed {
            Some(seed) => texture::synthesize(&source, &mut StdRng::seed_from_u64(seed)),
            None => texture::synthesize_with_thread_rng(&source),
        })
        .await
        .map_err(|e| PipelineError::Synthesis {
            file_id,
            reason: e.to_string(),
        })?;

        encoded.map_err(|e| PipelineError::Synthesis {
            file_id,
            reason: e.to_string(),
        })
    }

    async fn step_publish(&self, ctx: &PipelineContext<'_>) -> bool {
        let event = CompletionEvent {
            file_id: ctx.file_id,
            texture_path: ctx.texture_path.clone(),
        };

        match self.notifier.publish(&event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to publish completion event");
                false
            }
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) {
        if !delivery.is_claimed() {
            return;
        }
        if let Err(e) = self.queue.ack(delivery).await {
            warn!(error = %e, "Failed to acknowledge job; it will be redelivered when its lease expires");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::StageBroadcaster;
    use crate::db::{FileOp, FileRecord, InMemoryFileStore, ProcessingStatus};
    use crate::pipeline::progress::{BroadcastReporter, NoopReporter};
    use crate::queue::{InMemoryJobQueue, InMemoryNotifier};
    use crate::storage::InMemoryBlobStore;
    use crate::texture::{encode_png, TEXTURE_SIZE};
    use image::{Rgb, RgbImage};
    use std::time::Duration;

    struct Fixture {
        files: Arc<InMemoryFileStore>,
        blobs: Arc<InMemoryBlobStore>,
        queue: Arc<InMemoryJobQueue>,
        notifier: Arc<InMemoryNotifier>,
        pipeline: Pipeline,
    }

    fn fixture(queue: InMemoryJobQueue) -> Fixture {
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
                rng_seed: Some(7),
            },
        );
        Fixture {
            files,
            blobs,
            queue,
            notifier,
            pipeline,
        }
    }

    fn small_png() -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(8, 8, Rgb([200, 10, 10]))).unwrap()
    }

    fn delivery(file_id: i32) -> Delivery {
        Delivery::destructive(JobDescriptor::new(file_id).to_json().unwrap())
    }

    #[tokio::test]
    async fn test_successful_run() {
        let f = fixture(InMemoryJobQueue::destructive());
        f.files.insert(FileRecord::pending(42, "raw/42.jpg"));
        f.blobs.insert("raw/42.jpg", small_png());

        let outcome = f.pipeline.run(&delivery(42), &NoopReporter).await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Completed {
                file_id: 42,
                texture_path: "icons/42_texture.png".to_string(),
                notified: true,
            }
        );

        let record = f.files.get(42).unwrap();
        assert_eq!(record.status, ProcessingStatus::Complete);
        assert_eq!(record.texture_path.as_deref(), Some("icons/42_texture.png"));

        let stored = f.blobs.object("icons/42_texture.png").unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("image/png"));
        let decoded = image::load_from_memory(&stored.data).unwrap();
        assert_eq!(decoded.width(), TEXTURE_SIZE);
        assert_eq!(decoded.height(), TEXTURE_SIZE);

        assert_eq!(f.notifier.events().len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_source_still_completes() {
        let f = fixture(InMemoryJobQueue::destructive());
        f.files.insert(FileRecord::pending(5, "raw/5.bin"));
        f.blobs.insert("raw/5.bin", vec![1u8, 2, 3]);

        let outcome = f.pipeline.run(&delivery(5), &NoopReporter).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Completed { notified: true, .. }));
        assert!(f.blobs.object("icons/5_texture.png").is_some());
    }

    #[tokio::test]
    async fn test_seeded_runs_are_reproducible() {
        let f = fixture(InMemoryJobQueue::destructive());
        f.files.insert(FileRecord::pending(5, "raw/5.bin"));
        f.blobs.insert("raw/5.bin", vec![0u8; 16]);

        f.pipeline.run(&delivery(5), &NoopReporter).await.unwrap();
        let first = f.blobs.object("icons/5_texture.png").unwrap().data;
        f.pipeline.run(&delivery(5), &NoopReporter).await.unwrap();
        let second = f.blobs.object("icons/5_texture.png").unwrap().data;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_record_is_dropped() {
        let f = fixture(InMemoryJobQueue::destructive());

        let outcome = f.pipeline.run(&delivery(99), &NoopReporter).await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Dropped {
                file_id: 99,
                reason: DropReason::RecordNotFound,
            }
        );
        assert!(f.files.writes().is_empty());
        assert!(f.blobs.put_keys().is_empty());
        assert!(f.notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_null_source_path_is_dropped() {
        let f = fixture(InMemoryJobQueue::destructive());
        f.files.insert(FileRecord {
            source_path: None,
            ..FileRecord::pending(8, "")
        });

        let outcome = f.pipeline.run(&delivery(8), &NoopReporter).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Dropped {
                file_id: 8,
                reason: DropReason::NoSourcePath,
            }
        );
        assert!(f.files.writes().is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_leaves_processing() {
        let f = fixture(InMemoryJobQueue::destructive());
        f.files.insert(FileRecord::pending(42, "raw/42.jpg"));
        f.blobs.set_fail_get(true);

        let err = f.pipeline.run(&delivery(42), &NoopReporter).await.unwrap_err();

        assert_eq!(err.stage(), JobStage::Downloading);
        assert_eq!(err.file_id(), Some(42));
        assert_eq!(f.files.get(42).unwrap().status, ProcessingStatus::Processing);
        assert!(f.notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_orphans_blob() {
        let f = fixture(InMemoryJobQueue::destructive());
        f.files.insert(FileRecord::pending(42, "raw/42.jpg"));
        f.blobs.insert("raw/42.jpg", small_png());
        f.files.fail_on(FileOp::MarkComplete);

        let err = f.pipeline.run(&delivery(42), &NoopReporter).await.unwrap_err();

        assert_eq!(err.stage(), JobStage::Recording);
        assert!(f.blobs.object("icons/42_texture.png").is_some());
        assert_eq!(f.files.get(42).unwrap().status, ProcessingStatus::Processing);
        assert!(f.notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_completion() {
        let f = fixture(InMemoryJobQueue::destructive());
        f.files.insert(FileRecord::pending(42, "raw/42.jpg"));
        f.blobs.insert("raw/42.jpg", small_png());
        f.notifier.set_fail(true);

        let outcome = f.pipeline.run(&delivery(42), &NoopReporter).await.unwrap();

        assert!(matches!(outcome, JobOutcome::Completed { notified: false, .. }));
        assert_eq!(f.files.get(42).unwrap().status, ProcessingStatus::Complete);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let f = fixture(InMemoryJobQueue::destructive());

        let err = f
            .pipeline
            .run(&Delivery::destructive("not json"), &NoopReporter)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedDescriptor { .. }));
        assert!(f.files.writes().is_empty());
    }

    #[tokio::test]
    async fn test_claimed_delivery_acked_after_record() {
        let f = fixture(InMemoryJobQueue::claim(Duration::from_secs(300)));
        f.files.insert(FileRecord::pending(42, "raw/42.jpg"));
        f.blobs.insert("raw/42.jpg", small_png());
        f.queue.push(&JobDescriptor::new(42)).await.unwrap();

        let claimed = f.queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        f.pipeline.run(&claimed, &NoopReporter).await.unwrap();

        assert!(f.queue.inflight().is_empty());
        assert_eq!(f.queue.acked(), vec![claimed.payload.clone()]);
    }

    #[tokio::test]
    async fn test_claimed_delivery_kept_on_abort() {
        let f = fixture(InMemoryJobQueue::claim(Duration::from_secs(300)));
        f.files.insert(FileRecord::pending(42, "raw/42.jpg"));
        f.blobs.set_fail_get(true);
        f.queue.push(&JobDescriptor::new(42)).await.unwrap();

        let claimed = f.queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert!(f.pipeline.run(&claimed, &NoopReporter).await.is_err());

        assert_eq!(f.queue.inflight(), vec![claimed.payload.clone()]);
        assert!(f.queue.acked().is_empty());
    }

    #[tokio::test]
    async fn test_stage_sequence() {
        let f = fixture(InMemoryJobQueue::destructive());
        f.files.insert(FileRecord::pending(42, "raw/42.jpg"));
        f.blobs.insert("raw/42.jpg", small_png());

        let broadcaster = StageBroadcaster::new(32);
        let mut rx = broadcaster.subscribe();
        let reporter = BroadcastReporter::new(broadcaster);

        f.pipeline.run(&delivery(42), &reporter).await.unwrap();

        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.file_id, Some(42));
            stages.push(event.stage);
        }
        assert_eq!(
            stages,
            vec![
                JobStage::Dequeued,
                JobStage::LookingUp,
                JobStage::MarkingProcessing,
                JobStage::Downloading,
                JobStage::Synthesizing,
                JobStage::Uploading,
                JobStage::Recording,
                JobStage::Publishing,
                JobStage::Done,
            ]
        );
    }
}
