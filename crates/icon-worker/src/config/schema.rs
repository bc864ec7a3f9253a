use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

/// Complete runtime configuration for one worker process.
///
/// `Debug` output is safe to log: secrets are `SecretString` and print redacted.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub storage: StorageSettings,
    pub queue: QueueSettings,
    pub worker: WorkerSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// `host:port`
    pub addr: String,
}

impl RedisSettings {
    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: SecretString,
    pub bucket: String,
    pub operation_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Redis list holding pending job descriptors.
    pub name: String,
    /// Pub/sub channel for completion events.
    pub channel: String,
    pub delivery: DeliveryMode,
    /// How long a claimed descriptor may stay unacknowledged (claim mode only).
    pub visibility_timeout: Duration,
    /// Identifies this process's in-flight list (claim mode only).
    pub consumer: String,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub pop_timeout: Duration,
    pub error_backoff: Duration,
    pub texture_prefix: String,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    pub filter: String,
}

/// How descriptors are taken off the job queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// `BRPOP`: the descriptor is gone once popped. A failed attempt loses the job.
    #[default]
    Destructive,
    /// `BLMOVE` into an in-flight list with a lease; acknowledged after recording.
    Claim,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Destructive => "destructive",
            DeliveryMode::Claim => "claim",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "destructive" => Ok(DeliveryMode::Destructive),
            "claim" => Ok(DeliveryMode::Claim),
            other => Err(format!("expected 'destructive' or 'claim', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{}'", other)),
        }
    }
}

pub(crate) fn default_consumer_name() -> String {
    format!("icon-worker-{}", std::process::id())
}
