pub mod controller;
pub mod job;
pub mod sweeper;

pub use controller::{Controller, ControllerOptions, TickOutcome, WorkerStats};
pub use job::{texture_path, CompletionEvent, JobDescriptor};
pub use sweeper::{spawn_sweeper, sweep_interval};
