//! Record store: the `files` table in PostgreSQL, accessed through SeaORM.

use std::time::Duration;

use sea_orm::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sea_orm::{DatabaseConnection, SqlxPostgresConnector};
use secrecy::ExposeSecret;

use crate::config::DatabaseSettings;

pub mod entities;
pub mod error;
pub mod file_repo;
pub mod memory;

pub use error::DatabaseError;
pub use file_repo::{FileRecord, FileStore, ProcessingStatus, SeaOrmFileStore};
pub use memory::{FileOp, InMemoryFileStore, StatusWrite};

/// Jobs run one at a time.
const MAX_CONNECTIONS: u32 = 2;

/// Opens the PostgreSQL pool and verifies it with a first connection.
pub async fn connect(settings: &DatabaseSettings) -> Result<DatabaseConnection, DatabaseError> {
    let options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .password(settings.password.expose_secret())
        .database(&settings.name);

    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(settings.connect_timeout)
        .idle_timeout(Some(Duration::from_secs(600)))
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Connect {
            host: settings.host.clone(),
            port: settings.port,
            reason: e.to_string(),
        })?;

    log::info!(
        "Connected to database {} at {}:{}",
        settings.name,
        settings.host,
        settings.port
    );

    Ok(SqlxPostgresConnector::from_sqlx_postgres_pool(pool))
}
