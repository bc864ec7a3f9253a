use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::{Notifier, QueueError};
use crate::worker::job::CompletionEvent;

/// Publishes completion events on a Redis pub/sub channel.
///
/// Pub/sub is fire-and-forget: subscribers that are offline miss the event.
#[derive(Clone)]
pub struct RedisNotifier {
    conn: ConnectionManager,
    channel: String,
}

impl RedisNotifier {
    pub fn new(conn: ConnectionManager, channel: impl Into<String>) -> Self {
        Self {
            conn,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn publish(&self, event: &CompletionEvent) -> Result<(), QueueError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(QueueError::command("PUBLISH"))?;

        debug!(
            channel = %self.channel,
            file_id = event.file_id,
            receivers,
            "published completion event"
        );
        Ok(())
    }
}
