//! In-memory [`JobQueue`] and [`Notifier`] for tests.
//!
//! Ordering follows the Redis implementation: pushed descriptors are served
//! FIFO, requeued ones are served next.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{lease_deadline, now_ms, Delivery, JobQueue, Lease, Notifier, QueueError};
use crate::config::DeliveryMode;
use crate::worker::job::{CompletionEvent, JobDescriptor};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    inflight: Vec<(String, Lease)>,
    acked: Vec<String>,
    fail_pop: bool,
    fail_ack: bool,
}

pub struct InMemoryJobQueue {
    mode: DeliveryMode,
    consumer: String,
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
    pushed: Notify,
}

impl InMemoryJobQueue {
    pub fn destructive() -> Self {
        Self::new(DeliveryMode::Destructive, Duration::from_secs(300))
    }

    pub fn claim(visibility_timeout: Duration) -> Self {
        Self::new(DeliveryMode::Claim, visibility_timeout)
    }

    pub fn new(mode: DeliveryMode, visibility_timeout: Duration) -> Self {
        Self {
            mode,
            consumer: "in-memory".to_string(),
            visibility_timeout,
            state: Mutex::new(QueueState::default()),
            pushed: Notify::new(),
        }
    }

    /// Enqueues a raw payload, e.g. one that is not a valid descriptor.
    pub fn push_raw(&self, payload: impl Into<String>) {
        self.lock().pending.push_back(payload.into());
        self.pushed.notify_one();
    }

    /// Payloads waiting to be popped, next first.
    pub fn pending(&self) -> Vec<String> {
        self.lock().pending.iter().cloned().collect()
    }

    /// Claimed payloads that are neither acknowledged nor requeued.
    pub fn inflight(&self) -> Vec<String> {
        self.lock()
            .inflight
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect()
    }

    pub fn acked(&self) -> Vec<String> {
        self.lock().acked.clone()
    }

    pub fn set_fail_pop(&self, fail: bool) {
        self.lock().fail_pop = fail;
    }

    pub fn set_fail_ack(&self, fail: bool) {
        self.lock().fail_ack = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_pop(&self) -> Result<Option<Delivery>, QueueError> {
        let mut state = self.lock();
        if state.fail_pop {
            return Err(QueueError::Unavailable("injected pop failure".to_string()));
        }
        let Some(payload) = state.pending.pop_front() else {
            return Ok(None);
        };

        match self.mode {
            DeliveryMode::Destructive => Ok(Some(Delivery::destructive(payload))),
            DeliveryMode::Claim => {
                let lease = Lease {
                    consumer: self.consumer.clone(),
                    deadline_ms: lease_deadline(self.visibility_timeout),
                };
                state.inflight.push((payload.clone(), lease.clone()));
                Ok(Some(Delivery::claimed(payload, lease)))
            }
        }
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::destructive()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn delivery_mode(&self) -> DeliveryMode {
        self.mode
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        if let Some(delivery) = self.try_pop()? {
            return Ok(Some(delivery));
        }
        let _ = tokio::time::timeout(timeout, self.pushed.notified()).await;
        self.try_pop()
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let Some(lease) = &delivery.lease else {
            return Ok(());
        };
        let mut state = self.lock();
        if state.fail_ack {
            return Err(QueueError::Unavailable("injected ack failure".to_string()));
        }
        if let Some(pos) = state
            .inflight
            .iter()
            .position(|(payload, l)| payload == &delivery.payload && l.consumer == lease.consumer)
        {
            let (payload, _) = state.inflight.remove(pos);
            state.acked.push(payload);
        }
        Ok(())
    }

    async fn push(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        self.push_raw(job.to_json()?);
        Ok(())
    }

    async fn requeue_expired(&self) -> Result<usize, QueueError> {
        let now = now_ms();
        let mut state = self.lock();
        let (expired, live): (Vec<_>, Vec<_>) = state
            .inflight
            .drain(..)
            .partition(|(_, lease)| lease.deadline_ms <= now);
        state.inflight = live;

        let moved = expired.len();
        for (payload, _) in expired.into_iter().rev() {
            state.pending.push_front(payload);
        }
        drop(state);

        if moved > 0 {
            self.pushed.notify_one();
        }
        Ok(moved)
    }
}

/// Records published events; can be told to fail.
#[derive(Default)]
pub struct InMemoryNotifier {
    events: Mutex<Vec<CompletionEvent>>,
    fail: Mutex<bool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CompletionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn publish(&self, event: &CompletionEvent) -> Result<(), QueueError> {
        if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(QueueError::Unavailable("injected publish failure".to_string()));
        }
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}
