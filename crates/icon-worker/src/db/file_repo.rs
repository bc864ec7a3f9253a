//! File record repository: the three record-store operations the pipeline needs.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use super::entities::file;
use super::DatabaseError;

/// `files.processing_status` values, stored as upper-case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "PENDING",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Complete => "COMPLETE",
            ProcessingStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ProcessingStatus::Pending),
            "PROCESSING" => Ok(ProcessingStatus::Processing),
            "COMPLETE" => Ok(ProcessingStatus::Complete),
            "FAILED" => Ok(ProcessingStatus::Failed),
            other => Err(format!("unknown processing status '{}'", other)),
        }
    }
}

/// The view of a `files` row the pipeline works with.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: i32,
    /// `s3_path`: where the uploaded original lives. May be NULL.
    pub source_path: Option<String>,
    pub texture_path: Option<String>,
    pub status: ProcessingStatus,
}

impl FileRecord {
    pub fn pending(id: i32, source_path: impl Into<String>) -> Self {
        Self {
            id,
            source_path: Some(source_path.into()),
            texture_path: None,
            status: ProcessingStatus::Pending,
        }
    }
}

impl TryFrom<file::Model> for FileRecord {
    type Error = DatabaseError;

    fn try_from(model: file::Model) -> Result<Self, Self::Error> {
        // Column default is 'PENDING' but the column is nullable.
        let status = match model.processing_status {
            None => ProcessingStatus::Pending,
            Some(value) => value
                .parse()
                .map_err(|_| DatabaseError::UnknownStatus {
                    file_id: model.id,
                    value,
                })?,
        };

        Ok(Self {
            id: model.id,
            source_path: model.s3_path,
            texture_path: model.texture_path,
            status,
        })
    }
}

/// Record store operations used by the pipeline.
///
/// Implementations never create or delete rows.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Looks up a record by primary key. `Ok(None)` when the row does not exist.
    async fn find(&self, file_id: i32) -> Result<Option<FileRecord>, DatabaseError>;

    /// Sets `processing_status = 'PROCESSING'`.
    async fn mark_processing(&self, file_id: i32) -> Result<(), DatabaseError>;

    /// Sets `processing_status = 'COMPLETE'` and `texture_path` in one statement.
    async fn mark_complete(&self, file_id: i32, texture_path: &str) -> Result<(), DatabaseError>;
}

/// [`FileStore`] backed by a SeaORM connection (PostgreSQL in production).
#[derive(Clone)]
pub struct SeaOrmFileStore {
    db: DatabaseConnection,
}

impl SeaOrmFileStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl FileStore for SeaOrmFileStore {
    async fn find(&self, file_id: i32) -> Result<Option<FileRecord>, DatabaseError> {
        file::Entity::find_by_id(file_id)
            .one(&self.db)
            .await?
            .map(FileRecord::try_from)
            .transpose()
    }

    async fn mark_processing(&self, file_id: i32) -> Result<(), DatabaseError> {
        let result = file::Entity::update_many()
            .col_expr(
                file::Column::ProcessingStatus,
                Expr::value(ProcessingStatus::Processing.as_str()),
            )
            .filter(file::Column::Id.eq(file_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(DatabaseError::RecordNotFound { file_id });
        }
        Ok(())
    }

    async fn mark_complete(&self, file_id: i32, texture_path: &str) -> Result<(), DatabaseError> {
        let result = file::Entity::update_many()
            .col_expr(
                file::Column::ProcessingStatus,
                Expr::value(ProcessingStatus::Complete.as_str()),
            )
            .col_expr(file::Column::TexturePath, Expr::value(texture_path))
            .filter(file::Column::Id.eq(file_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(DatabaseError::RecordNotFound { file_id });
        }
        Ok(())
    }
}
