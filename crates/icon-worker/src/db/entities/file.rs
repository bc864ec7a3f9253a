//! File record entity (subset of the gateway-owned `files` table).

use sea_orm::entity::prelude::*;

/// The columns of `files` this worker reads or writes.
///
/// Other columns of the table (owner, name, size, ...) are never selected.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "files")]
pub struct Model {
    /// `SERIAL` primary key; the `file_id` of a job descriptor.
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Blob-store key of the uploaded original.
    pub s3_path: Option<String>,
    /// Blob-store key of the generated texture.
    pub texture_path: Option<String>,
    /// `PENDING`, `PROCESSING`, `COMPLETE` or `FAILED`.
    pub processing_status: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
