//! Job queue and completion notifications.
//!
//! Two delivery modes are supported:
//!
//! * **destructive** (`BRPOP`): a popped descriptor exists only in this
//!   process. If the attempt fails the job is gone.
//! * **claim** (`BLMOVE` + lease): the descriptor is moved to a per-consumer
//!   in-flight list and leased until a deadline. It is removed by [`JobQueue::ack`];
//!   leases that expire are returned to the main list by
//!   [`JobQueue::requeue_expired`].

pub mod error;
pub mod memory;
pub mod redis_pubsub;
pub mod redis_queue;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::DeliveryMode;
use crate::worker::job::{CompletionEvent, JobDescriptor};

pub use error::QueueError;
pub use memory::{InMemoryJobQueue, InMemoryNotifier};
pub use redis_pubsub::RedisNotifier;
pub use redis_queue::{connect, RedisJobQueue};

/// Ownership record for a claimed descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub consumer: String,
    /// Unix epoch milliseconds after which the descriptor may be handed out again.
    pub deadline_ms: i64,
}

/// One raw payload taken off the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: String,
    /// `None` for destructive deliveries.
    pub lease: Option<Lease>,
}

impl Delivery {
    pub fn destructive(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            lease: None,
        }
    }

    pub fn claimed(payload: impl Into<String>, lease: Lease) -> Self {
        Self {
            payload: payload.into(),
            lease: Some(lease),
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.lease.is_some()
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    fn delivery_mode(&self) -> DeliveryMode;

    /// Waits up to `timeout` for the next payload. `Ok(None)` on timeout.
    async fn pop(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Releases a claimed delivery for good. No-op for destructive deliveries.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Enqueues a descriptor behind everything already waiting.
    async fn push(&self, job: &JobDescriptor) -> Result<(), QueueError>;

    /// Returns claimed descriptors whose lease has expired to the head of
    /// the queue. Returns how many were moved. Always 0 in destructive mode.
    async fn requeue_expired(&self) -> Result<usize, QueueError>;
}

/// Best-effort fan-out of completion events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &CompletionEvent) -> Result<(), QueueError>;
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn lease_deadline(visibility_timeout: Duration) -> i64 {
    now_ms().saturating_add(i64::try_from(visibility_timeout.as_millis()).unwrap_or(i64::MAX))
}
