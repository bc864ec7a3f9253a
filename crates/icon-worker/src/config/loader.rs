use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::config::schema::{
    default_consumer_name, DatabaseSettings, LoggingSettings, QueueSettings, RedisSettings,
    StorageSettings, WorkerConfig, WorkerSettings,
};
use crate::error::ConfigError;
use crate::secrets::resolve_secret_or;

/// Loads the configuration from the process environment.
///
/// Variables that are not valid UTF-8 are ignored (treated as unset).
pub fn load_config() -> Result<WorkerConfig, ConfigError> {
    load_config_from_vars(
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
    )
}

/// Loads the configuration from an explicit set of variables.
pub fn load_config_from_vars<I, K, V>(vars: I) -> Result<WorkerConfig, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let vars = Vars(
        vars.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    );

    let config = WorkerConfig {
        database: DatabaseSettings {
            host: vars.string("DB_HOST", "localhost"),
            port: vars.parse("DB_PORT", 5432)?,
            user: vars.string("DB_USER", "postgres"),
            password: resolve_secret_or(
                vars.get("DB_PASSWORD"),
                vars.get("DB_PASSWORD_FILE"),
                "postgres",
            )
            .map_err(|source| ConfigError::Secret {
                name: "DB_PASSWORD",
                source,
            })?,
            name: vars.string("DB_NAME", "memory_vault"),
            connect_timeout: vars.secs("DB_CONNECT_TIMEOUT_SECS", 10)?,
        },
        redis: RedisSettings {
            addr: vars.string("REDIS_ADDR", "localhost:6379"),
        },
        storage: StorageSettings {
            endpoint: vars.string("S3_ENDPOINT", "http://localhost:9000"),
            region: vars.string("S3_REGION", "us-east-1"),
            access_key: vars.string("S3_ACCESS_KEY", "minioadmin"),
            secret_key: resolve_secret_or(
                vars.get("S3_SECRET_KEY"),
                vars.get("S3_SECRET_KEY_FILE"),
                "minioadmin",
            )
            .map_err(|source| ConfigError::Secret {
                name: "S3_SECRET_KEY",
                source,
            })?,
            bucket: vars.string("S3_BUCKET", "memory-vault"),
            operation_timeout: vars.secs("S3_OPERATION_TIMEOUT_SECS", 60)?,
        },
        queue: QueueSettings {
            name: vars.string("JOB_QUEUE", "icon_jobs"),
            channel: vars.string("UPDATES_CHANNEL", "file_updates"),
            delivery: vars.parse("DELIVERY_MODE", Default::default())?,
            visibility_timeout: vars.secs("VISIBILITY_TIMEOUT_SECS", 300)?,
            consumer: vars
                .get("CONSUMER_NAME")
                .map(str::to_string)
                .unwrap_or_else(default_consumer_name),
        },
        worker: WorkerSettings {
            pop_timeout: vars.secs("POP_TIMEOUT_SECS", 5)?,
            error_backoff: vars.secs("ERROR_BACKOFF_SECS", 5)?,
            texture_prefix: vars
                .string("TEXTURE_PREFIX", "icons")
                .trim_end_matches('/')
                .to_string(),
        },
        logging: LoggingSettings {
            format: vars.parse("LOG_FORMAT", Default::default())?,
            filter: vars.string("RUST_LOG", "info"),
        },
    };

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    let required = [
        ("DB_HOST", &config.database.host),
        ("DB_USER", &config.database.user),
        ("DB_NAME", &config.database.name),
        ("S3_ENDPOINT", &config.storage.endpoint),
        ("S3_REGION", &config.storage.region),
        ("S3_BUCKET", &config.storage.bucket),
        ("JOB_QUEUE", &config.queue.name),
        ("UPDATES_CHANNEL", &config.queue.channel),
        ("CONSUMER_NAME", &config.queue.consumer),
        ("TEXTURE_PREFIX", &config.worker.texture_prefix),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{} must not be empty", name),
            });
        }
    }

    let timeouts = [
        ("DB_CONNECT_TIMEOUT_SECS", config.database.connect_timeout),
        ("S3_OPERATION_TIMEOUT_SECS", config.storage.operation_timeout),
        ("VISIBILITY_TIMEOUT_SECS", config.queue.visibility_timeout),
        ("POP_TIMEOUT_SECS", config.worker.pop_timeout),
    ];
    for (name, value) in timeouts {
        if value.is_zero() {
            return Err(ConfigError::Validation {
                message: format!("{} must be greater than zero", name),
            });
        }
    }

    if config.queue.consumer.contains('\n') {
        return Err(ConfigError::InvalidValue {
            name: "CONSUMER_NAME",
            value: config.queue.consumer.clone(),
            reason: "must not contain a newline".to_string(),
        });
    }

    validate_redis_addr(&config.redis.addr)?;

    if !config.storage.endpoint.starts_with("http://")
        && !config.storage.endpoint.starts_with("https://")
    {
        return Err(ConfigError::InvalidValue {
            name: "S3_ENDPOINT",
            value: config.storage.endpoint.clone(),
            reason: "expected an http:// or https:// URL".to_string(),
        });
    }

    Ok(())
}

fn validate_redis_addr(addr: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        name: "REDIS_ADDR",
        value: addr.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("host is empty"));
    }
    port.parse::<u16>()
        .map_err(|_| invalid("port is not a number in 0-65535"))?;

    Ok(())
}

struct Vars(HashMap<String, String>);

impl Vars {
    /// Returns the value if set and non-empty.
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    name,
                    value: raw.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    fn secs(&self, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.parse(name, default).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DeliveryMode, LogFormat};
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load(pairs: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        load_config_from_vars(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn test_defaults_match_local_development_stack() {
        let config = load(&[]).unwrap();

        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.user, "postgres");
        assert_eq!(config.database.password.expose_secret(), "postgres");
        assert_eq!(config.database.name, "memory_vault");
        assert_eq!(config.redis.addr, "localhost:6379");
        assert_eq!(config.redis.url(), "redis://localhost:6379");
        assert_eq!(config.storage.endpoint, "http://localhost:9000");
        assert_eq!(config.storage.access_key, "minioadmin");
        assert_eq!(config.storage.secret_key.expose_secret(), "minioadmin");
        assert_eq!(config.storage.bucket, "memory-vault");
        assert_eq!(config.queue.name, "icon_jobs");
        assert_eq!(config.queue.channel, "file_updates");
        assert_eq!(config.queue.delivery, DeliveryMode::Destructive);
        assert!(config.queue.consumer.starts_with("icon-worker-"));
        assert_eq!(config.worker.pop_timeout, Duration::from_secs(5));
        assert_eq!(config.worker.error_backoff, Duration::from_secs(5));
        assert_eq!(config.worker.texture_prefix, "icons");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("REDIS_ADDR", "redis:6380"),
            ("S3_BUCKET", "textures"),
            ("DELIVERY_MODE", "claim"),
            ("CONSUMER_NAME", "worker-a"),
            ("POP_TIMEOUT_SECS", "2"),
            ("TEXTURE_PREFIX", "thumbs/"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.redis.url(), "redis://redis:6380");
        assert_eq!(config.storage.bucket, "textures");
        assert_eq!(config.queue.delivery, DeliveryMode::Claim);
        assert_eq!(config.queue.consumer, "worker-a");
        assert_eq!(config.worker.pop_timeout, Duration::from_secs(2));
        assert_eq!(config.worker.texture_prefix, "thumbs");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_empty_value_falls_back_to_default() {
        let config = load(&[("DB_HOST", ""), ("DB_PORT", "")]).unwrap();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
    }

    #[test]
    fn test_invalid_port() {
        let result = load(&[("DB_PORT", "postgres")]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "DB_PORT",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_pop_timeout_rejected() {
        let result = load(&[("POP_TIMEOUT_SECS", "0")]);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_error_backoff_allowed() {
        let config = load(&[("ERROR_BACKOFF_SECS", "0")]).unwrap();
        assert!(config.worker.error_backoff.is_zero());
    }

    #[test]
    fn test_unknown_delivery_mode() {
        let result = load(&[("DELIVERY_MODE", "exactly-once")]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "DELIVERY_MODE",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_log_format() {
        let result = load(&[("LOG_FORMAT", "xml")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_redis_addr() {
        for addr in ["localhost", ":6379", "localhost:port", "localhost:70000"] {
            let result = load(&[("REDIS_ADDR", addr)]);
            assert!(
                matches!(
                    result,
                    Err(ConfigError::InvalidValue {
                        name: "REDIS_ADDR",
                        ..
                    })
                ),
                "{} should be rejected",
                addr
            );
        }
    }

    #[test]
    fn test_invalid_s3_endpoint() {
        let result = load(&[("S3_ENDPOINT", "localhost:9000")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_queue_name_rejected() {
        let result = load(&[("JOB_QUEUE", "   ")]);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_consumer_name_with_newline_rejected() {
        let result = load(&[("CONSUMER_NAME", "worker\na")]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "CONSUMER_NAME",
                ..
            })
        ));
    }

    #[test]
    fn test_secret_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "s3cr3t").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let config = load(&[("S3_SECRET_KEY_FILE", path.as_str())]).unwrap();
        assert_eq!(config.storage.secret_key.expose_secret(), "s3cr3t");
    }

    #[test]
    fn test_unreadable_secret_file() {
        let result = load(&[("DB_PASSWORD_FILE", "/nonexistent/db_password")]);
        assert!(matches!(
            result,
            Err(ConfigError::Secret {
                name: "DB_PASSWORD",
                ..
            })
        ));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = load(&[("DB_PASSWORD", "hunter2")]).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
    }

    // Tests that modify environment variables must run serially to avoid race conditions
    #[test]
    #[serial]
    fn test_load_config_reads_process_env() {
        std::env::set_var("JOB_QUEUE", "icon_jobs_from_env");
        let config = load_config().unwrap();
        assert_eq!(config.queue.name, "icon_jobs_from_env");
        std::env::remove_var("JOB_QUEUE");
    }
}
