use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{validate_bucket, validate_key, ObjectMeta, ObjectStore, StoreError, StoredObject};

/// Filesystem-backed store: `<root>/<bucket>/<key>`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a bucket. A bucket name is a single path segment.
    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        validate_bucket(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let dir = self.bucket_path(bucket)?;
        validate_key(key)?;
        Ok(dir.join(key))
    }

    async fn meta_for(&self, bucket: &str, key: &str, path: &Path) -> Result<ObjectMeta, StoreError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| not_found_or_io(e, bucket, key))?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(ObjectMeta {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: metadata.len(),
            content_type: guess_content_type(key).map(String::from),
            last_modified,
        })
    }
}

fn not_found_or_io(err: io::Error, bucket: &str, key: &str) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        StoreError::Io(err)
    }
}

fn guess_content_type(key: &str) -> Option<&'static str> {
    match key.rsplit('.').next()? {
        "txt" => Some("text/plain"),
        "json" => Some("application/json"),
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "m4a" => Some("audio/mp4"),
        _ => None,
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<ObjectMeta, StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file first so readers never see a partial object.
        let tmp = path.with_file_name(format!(
            ".{}.{}.tmp",
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("object"),
            uuid::Uuid::new_v4()
        ));
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &path).await?;

        debug!("Stored {}/{} ({} bytes)", bucket, key, body.len());
        self.meta_for(bucket, key, &path).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        let path = self.object_path(bucket, key)?;
        let meta = self.meta_for(bucket, key, &path).await?;
        let body = fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, bucket, key))?;
        Ok(StoredObject { meta, body })
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError> {
        let path = self.object_path(bucket, key)?;
        self.meta_for(bucket, key, &path).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let bucket_dir = self.bucket_path(bucket)?;
        let mut keys = Vec::new();
        let mut pending = vec![bucket_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&bucket_dir) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let hidden = key.rsplit('/').next().is_some_and(|n| n.starts_with('.'));
                if !hidden && key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
