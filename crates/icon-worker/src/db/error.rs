//! Database error types.

use thiserror::Error;

/// Errors from record store operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The initial connection could not be established.
    #[error("Failed to connect to database at {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// Error reported by SeaORM or the underlying driver.
    #[error("Database query failed: {0}")]
    Query(#[from] sea_orm::DbErr),

    /// An update matched no row.
    #[error("File record {file_id} not found")]
    RecordNotFound { file_id: i32 },

    /// A stored status value is not one of the known states.
    #[error("File record {file_id} has unknown processing status '{value}'")]
    UnknownStatus { file_id: i32, value: String },

    /// Failure injected by an in-memory test double.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}
