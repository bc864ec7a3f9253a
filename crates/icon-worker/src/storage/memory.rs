//! In-memory [`BlobStore`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{BlobStore, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
}

#[derive(Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    puts: Vec<String>,
    fail_get: bool,
    fail_put: bool,
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    state: Mutex<State>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without counting it as a write.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.lock().objects.insert(
            key.into(),
            StoredObject {
                data: data.into(),
                content_type: None,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    /// Keys passed to [`BlobStore::put`], in call order.
    pub fn put_keys(&self) -> Vec<String> {
        self.lock().puts.clone()
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.lock().fail_get = fail;
    }

    pub fn set_fail_put(&self, fail: bool) {
        self.lock().fail_put = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let state = self.lock();
        if state.fail_get {
            return Err(StorageError::Unavailable(format!("injected get failure for '{}'", key)));
        }
        state
            .objects
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        let mut state = self.lock();
        if state.fail_put {
            return Err(StorageError::Unavailable(format!("injected put failure for '{}'", key)));
        }
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: Some(content_type.to_string()),
            },
        );
        state.puts.push(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryBlobStore::new();
        store
            .put("icons/1_texture.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        assert_eq!(store.get("icons/1_texture.png").await.unwrap(), "png");
        let object = store.object("icons/1_texture.png").unwrap();
        assert_eq!(object.content_type.as_deref(), Some("image/png"));
        assert_eq!(store.put_keys(), vec!["icons/1_texture.png"]);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.get("raw/none.jpg").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryBlobStore::new();
        store.insert("raw/1.jpg", vec![1u8, 2, 3]);
        store.set_fail_get(true);
        store.set_fail_put(true);

        assert!(store.get("raw/1.jpg").await.is_err());
        assert!(store
            .put("icons/1_texture.png", Bytes::new(), "image/png")
            .await
            .is_err());
        assert!(store.put_keys().is_empty());
    }
}
