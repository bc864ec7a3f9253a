use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use secrecy::ExposeSecret;
use tracing::debug;

use super::{BlobStore, StorageError};
use crate::config::StorageSettings;

/// [`BlobStore`] for S3-compatible services (AWS S3, MinIO).
#[derive(Clone, Debug)]
pub struct S3BlobStore {
    client: Arc<Client>,
    bucket: String,
}

impl S3BlobStore {
    /// Builds the client from static credentials.
    ///
    /// Path-style addressing is forced so MinIO endpoints such as
    /// `http://localhost:9000` work without bucket subdomains.
    pub fn new(settings: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.expose_secret().to_string(),
            None,
            None,
            "icon-worker-env",
        );

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(settings.operation_timeout)
            .build();

        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(&settings.endpoint)
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .force_path_style(true)
            .build();

        Self::from_client(Client::from_conf(config), settings.bucket.clone())
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Checks that the bucket exists and the credentials can reach it.
    pub async fn check_bucket(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|source| StorageError::HeadBucket {
                bucket: self.bucket.clone(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|source| StorageError::GetObject {
                key: key.to_string(),
                source,
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::ObjectStream {
                key: key.to_string(),
                reason: e.to_string(),
            })?
            .into_bytes();

        debug!(key, bytes = data.len(), "downloaded object");
        Ok(data)
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        let len = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|source| StorageError::PutObject {
                key: key.to_string(),
                source,
            })?;

        debug!(key, bytes = len, "uploaded object");
        Ok(())
    }
}
