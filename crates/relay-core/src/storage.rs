//! Blob storage port for handlers that persist artifacts.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Errors from a blob store backend.
///
/// Backend outages are assumed recoverable: handlers map these to transient
/// task failures so the retry machinery re-runs the write.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob store unavailable: {0}")]
    Unavailable(String),

    #[error("blob rejected: {0}")]
    Rejected(String),
}

/// Write-side port for an external blob/object store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path`, overwriting any previous content.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<(), StorageError>;
}

/// A stored blob, as the in-memory backend keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory blob store. Backs tests and the demo binary; a deployment would
/// swap in an implementation speaking to a real object store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored blob by path.
    pub async fn get(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.lock().await.get(path).cloned()
    }

    /// Every stored path, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!(path, size = bytes.len(), content_type, "storing blob");
        self.blobs.lock().await.insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_returns_the_blob() {
        let store = MemoryBlobStore::new();

        store
            .put("results/answer.json", b"{\"value\":50}".to_vec(), "application/json")
            .await
            .unwrap();

        let blob = store.get("results/answer.json").await.unwrap();
        assert_eq!(blob.bytes, b"{\"value\":50}");
        assert_eq!(blob.content_type, "application/json");
    }

    #[tokio::test]
    async fn put_overwrites_existing_path() {
        let store = MemoryBlobStore::new();

        store
            .put("a", b"one".to_vec(), "text/plain")
            .await
            .unwrap();
        store
            .put("a", b"two".to_vec(), "text/plain")
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.paths().await, vec!["a".to_string()]);
        assert_eq!(store.get("a").await.unwrap().bytes, b"two");
    }

    #[tokio::test]
    async fn missing_path_is_none() {
        let store = MemoryBlobStore::new();
        assert!(store.get("nope").await.is_none());
    }
}
