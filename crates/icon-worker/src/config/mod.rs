pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_vars, validate_config};
pub use schema::{
    DatabaseSettings, DeliveryMode, LogFormat, LoggingSettings, QueueSettings, RedisSettings,
    StorageSettings, WorkerConfig, WorkerSettings,
};
