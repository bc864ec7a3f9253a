//! Redis list-backed [`JobQueue`].
//!
//! Keys, for a queue named `icon_jobs`:
//!
//! | Key | Type | Purpose |
//! |---|---|---|
//! | `icon_jobs` | list | pending payloads; producers `LPUSH`, consumers pop from the right |
//! | `icon_jobs:inflight:<consumer>` | list | payloads claimed by one consumer (claim mode) |
//! | `icon_jobs:leases` | sorted set | `<consumer>\n<payload>` scored by lease deadline (ms) |

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::{debug, warn};

use super::{lease_deadline, now_ms, Delivery, JobQueue, Lease, QueueError};
use crate::config::{DeliveryMode, QueueSettings, RedisSettings};
use crate::worker::job::JobDescriptor;

/// Upper bound on expired leases handled per sweep.
const REQUEUE_BATCH: isize = 100;

/// KEYS: leases, inflight list, main list. ARGV: lease member, payload.
/// Only the caller that removes the lease moves the payload, so concurrent
/// sweepers never requeue twice.
const REQUEUE_SCRIPT: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 1 then
  redis.call('LREM', KEYS[2], 1, ARGV[2])
  redis.call('RPUSH', KEYS[3], ARGV[2])
  return 1
end
return 0
"#;

/// Opens a managed connection (reconnects transparently after failures).
pub async fn connect(settings: &RedisSettings) -> Result<ConnectionManager, QueueError> {
    let url = settings.url();
    let client = redis::Client::open(url.as_str()).map_err(|source| QueueError::Connect {
        url: url.clone(),
        source,
    })?;
    ConnectionManager::new(client)
        .await
        .map_err(|source| QueueError::Connect { url, source })
}

pub struct RedisJobQueue {
    conn: ConnectionManager,
    queue: String,
    mode: DeliveryMode,
    consumer: String,
    visibility_timeout: Duration,
    requeue: Script,
}

impl RedisJobQueue {
    /// `conn` should not be shared with callers that need low latency:
    /// blocking pops occupy it for up to the pop timeout.
    pub fn new(conn: ConnectionManager, settings: &QueueSettings) -> Self {
        Self {
            conn,
            queue: settings.name.clone(),
            mode: settings.delivery,
            consumer: settings.consumer.clone(),
            visibility_timeout: settings.visibility_timeout,
            requeue: Script::new(REQUEUE_SCRIPT),
        }
    }

    fn inflight_key(&self, consumer: &str) -> String {
        inflight_key(&self.queue, consumer)
    }

    fn leases_key(&self) -> String {
        leases_key(&self.queue)
    }

    async fn pop_destructive(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.clone();
        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.queue)
            .arg(timeout_arg(timeout))
            .query_async(&mut conn)
            .await
            .map_err(QueueError::command("BRPOP"))?;

        Ok(reply.map(|(_, payload)| Delivery::destructive(payload)))
    }

    async fn pop_claim(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.clone();
        let inflight = self.inflight_key(&self.consumer);

        let payload: Option<String> = redis::cmd("BLMOVE")
            .arg(&self.queue)
            .arg(&inflight)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(timeout_arg(timeout))
            .query_async(&mut conn)
            .await
            .map_err(QueueError::command("BLMOVE"))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let lease = Lease {
            consumer: self.consumer.clone(),
            deadline_ms: lease_deadline(self.visibility_timeout),
        };

        let leased: Result<i64, _> = redis::cmd("ZADD")
            .arg(self.leases_key())
            .arg(lease.deadline_ms)
            .arg(lease_member(&lease.consumer, &payload))
            .query_async(&mut conn)
            .await;

        if let Err(source) = leased {
            // The payload was pushed to the head of the in-flight list; hand it back.
            let restored: Result<Option<String>, _> = redis::cmd("LMOVE")
                .arg(&inflight)
                .arg(&self.queue)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await;
            if let Err(e) = restored {
                warn!(
                    inflight = %inflight,
                    error = %e,
                    "claimed payload has no lease and could not be returned to the queue"
                );
            }
            return Err(QueueError::Command {
                command: "ZADD",
                source,
            });
        }

        Ok(Some(Delivery::claimed(payload, lease)))
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    fn delivery_mode(&self) -> DeliveryMode {
        self.mode
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        match self.mode {
            DeliveryMode::Destructive => self.pop_destructive(timeout).await,
            DeliveryMode::Claim => self.pop_claim(timeout).await,
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let Some(lease) = &delivery.lease else {
            return Ok(());
        };

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("ZREM")
            .arg(self.leases_key())
            .arg(lease_member(&lease.consumer, &delivery.payload))
            .ignore()
            .cmd("LREM")
            .arg(self.inflight_key(&lease.consumer))
            .arg(1)
            .arg(&delivery.payload)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(QueueError::command("MULTI ZREM LREM"))
    }

    async fn push(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        let payload = job.to_json()?;
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.queue)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(QueueError::command("LPUSH"))?;
        Ok(())
    }

    async fn requeue_expired(&self) -> Result<usize, QueueError> {
        if self.mode == DeliveryMode::Destructive {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let leases = self.leases_key();
        let expired: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&leases)
            .arg("-inf")
            .arg(now_ms())
            .arg("LIMIT")
            .arg(0)
            .arg(REQUEUE_BATCH)
            .query_async(&mut conn)
            .await
            .map_err(QueueError::command("ZRANGEBYSCORE"))?;

        let mut moved = 0;
        for member in &expired {
            let Some((consumer, payload)) = split_lease_member(member) else {
                warn!(member = %member, "dropping malformed lease entry");
                let _: i64 = redis::cmd("ZREM")
                    .arg(&leases)
                    .arg(member)
                    .query_async(&mut conn)
                    .await
                    .map_err(QueueError::command("ZREM"))?;
                continue;
            };

            let requeued: i64 = self
                .requeue
                .key(&leases)
                .key(self.inflight_key(consumer))
                .key(&self.queue)
                .arg(member)
                .arg(payload)
                .invoke_async(&mut conn)
                .await
                .map_err(QueueError::command("EVALSHA"))?;

            if requeued == 1 {
                debug!(consumer, payload, "lease expired, descriptor requeued");
                moved += 1;
            }
        }

        Ok(moved)
    }
}

fn inflight_key(queue: &str, consumer: &str) -> String {
    format!("{}:inflight:{}", queue, consumer)
}

fn leases_key(queue: &str) -> String {
    format!("{}:leases", queue)
}

fn lease_member(consumer: &str, payload: &str) -> String {
    format!("{}\n{}", consumer, payload)
}

fn split_lease_member(member: &str) -> Option<(&str, &str)> {
    member
        .split_once('\n')
        .filter(|(consumer, _)| !consumer.is_empty())
}

/// Whole seconds are sent as integers so servers older than 6.0 accept them.
fn timeout_arg(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        timeout.as_secs().to_string()
    } else {
        format!("{:.3}", timeout.as_secs_f64())
    }
}
