use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to Redis at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: redis::RedisError,
    },

    #[error("Redis {command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: redis::RedisError,
    },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Failure injected by an in-memory test double.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

impl QueueError {
    pub(crate) fn command(command: &'static str) -> impl FnOnce(redis::RedisError) -> Self {
        move |source| QueueError::Command { command, source }
    }
}
