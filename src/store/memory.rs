use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{validate_bucket, validate_key, ObjectMeta, ObjectStore, StoreError, StoredObject};

/// In-process store, used for `storage.backend = "memory"` and in tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    puts: Mutex<u64>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation, overwrites included.
    pub async fn put_count(&self) -> u64 {
        *self.puts.lock().await
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<ObjectMeta, StoreError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let meta = ObjectMeta {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: body.len() as u64,
            content_type: content_type.map(String::from),
            last_modified: Utc::now(),
        };
        self.objects.lock().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                meta: meta.clone(),
                body,
            },
        );
        *self.puts.lock().await += 1;
        Ok(meta)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
        validate_bucket(bucket)?;
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError> {
        self.get(bucket, key).await.map(|o| o.meta)
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        validate_bucket(bucket)?;
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}
