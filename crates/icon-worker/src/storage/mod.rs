//! Blob store: source images in, textures out.

pub mod error;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::StorageError;
pub use memory::{InMemoryBlobStore, StoredObject};
pub use s3::S3BlobStore;

/// Key/value object storage against a single bucket.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetches the full object at `key`.
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Stores `data` at `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;
}
