//! Icon worker: consumes file ids from a Redis list, renders a 64x64 PNG
//! texture for each file's uploaded original, stores it next to the original
//! in S3 and records the result in PostgreSQL.

pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod secrets;
pub mod storage;
pub mod texture;
pub mod worker;

pub use broadcast::{JobStage, StageBroadcaster, StageEvent};
pub use config::{load_config, load_config_from_vars, DeliveryMode, WorkerConfig};
pub use error::{ConfigError, IconWorkerError, Result};
pub use pipeline::{JobOutcome, Pipeline, PipelineConfig, PipelineError, StageReporter};
pub use secrets::{resolve_secret, SecretError};
pub use worker::{Controller, ControllerOptions, TickOutcome, WorkerStats};
