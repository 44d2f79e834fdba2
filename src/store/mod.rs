//! Key-addressed object storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// A fetched object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub body: Vec<u8>,
}

impl StoredObject {
    pub fn text(&self) -> Result<String, StoreError> {
        String::from_utf8(self.body.clone()).map_err(|_| StoreError::InvalidContent {
            bucket: self.meta.bucket.clone(),
            key: self.meta.key.clone(),
        })
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<ObjectMeta, StoreError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError>;

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError>;

    /// Keys in `bucket` starting with `prefix`, sorted.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("object {bucket}/{key} is not valid UTF-8 text")]
    InvalidContent { bucket: String, key: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Missing objects and malformed keys will not fix themselves on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

/// Reject keys that are empty, absolute, or climb out of the bucket.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// A bucket name is a single, non-relative path segment.
pub fn validate_bucket(bucket: &str) -> Result<(), StoreError> {
    validate_key(bucket)?;
    if bucket.contains('/') || bucket.contains('\\') {
        return Err(StoreError::InvalidKey(bucket.to_string()));
    }
    Ok(())
}
