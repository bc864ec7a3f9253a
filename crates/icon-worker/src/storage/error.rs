use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to get object '{key}': {source}")]
    GetObject {
        key: String,
        #[source]
        source: SdkError<GetObjectError>,
    },

    #[error("Failed to stream object '{key}': {reason}")]
    ObjectStream { key: String, reason: String },

    #[error("Failed to put object '{key}': {source}")]
    PutObject {
        key: String,
        #[source]
        source: SdkError<PutObjectError>,
    },

    #[error("Bucket '{bucket}' is not reachable: {source}")]
    HeadBucket {
        bucket: String,
        #[source]
        source: SdkError<HeadBucketError>,
    },

    #[error("Object '{key}' does not exist")]
    NotFound { key: String },

    /// Failure injected by an in-memory test double.
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),
}
