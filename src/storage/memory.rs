//! In-Memory Object Store
//!
//! Information Hiding:
//! - BTreeMap storage structure hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Suitable for testing and ephemeral runs

use super::{validate_path, ObjectStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory container keyed by object path
/// Data is lost when process terminates
#[derive(Clone)]
pub struct InMemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn ensure_container(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        validate_path(path)?;
        let size = bytes.len();
        self.objects.write().await.insert(path.to_string(), bytes);
        tracing::debug!("[InMemoryStore] Put '{}' ({} bytes)", path, size);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        validate_path(path)?;
        let found = self.objects.read().await.get(path).cloned();
        if found.is_none() {
            tracing::debug!("[InMemoryStore] Object '{}' does not exist", path);
        }
        Ok(found)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        if self.objects.write().await.remove(path).is_some() {
            tracing::debug!("[InMemoryStore] Deleted '{}'", path);
        } else {
            tracing::debug!("[InMemoryStore] Object '{}' does not exist, nothing to delete", path);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().await;
        let paths: Vec<String> = objects
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect();
        tracing::debug!("[InMemoryStore] Listed {} objects under '{}'", paths.len(), prefix);
        Ok(paths)
    }

    async fn exists(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryStore::new();
        store.put("sessions/a", b"{}".to_vec()).await.unwrap();

        let loaded = store.get("sessions/a").await.unwrap();
        assert_eq!(loaded.as_deref(), Some(&b"{}"[..]));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = InMemoryStore::new();
        assert!(store.get("sessions/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryStore::new();
        store.put("metadata/s", b"1".to_vec()).await.unwrap();
        store.put("metadata/s", b"2".to_vec()).await.unwrap();
        assert_eq!(store.get("metadata/s").await.unwrap().unwrap(), b"2".to_vec());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStore::new();
        store.put("sessions/a", b"{}".to_vec()).await.unwrap();
        assert!(store.exists("sessions/a").await);

        store.delete("sessions/a").await.unwrap();
        store.delete("sessions/a").await.unwrap();
        assert!(!store.exists("sessions/a").await);
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = InMemoryStore::new();
        store.put("messages/s1/m1", b"{}".to_vec()).await.unwrap();
        store.put("messages/s1/m2", b"{}".to_vec()).await.unwrap();
        store.put("messages/s10/m3", b"{}".to_vec()).await.unwrap();
        store.put("sessions/s1", b"{}".to_vec()).await.unwrap();

        let paths = store.list("messages/s1/").await.unwrap();
        assert_eq!(paths, vec!["messages/s1/m1", "messages/s1/m2"]);

        let all = store.list("").await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_rejects_escaping_path() {
        let store = InMemoryStore::new();
        assert!(store.put("../x", b"{}".to_vec()).await.is_err());
    }
}
