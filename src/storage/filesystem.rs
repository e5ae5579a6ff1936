//! File System Object Store
//!
//! Information Hiding:
//! - Container is a directory; object paths map to files beneath it
//! - Directory creation and traversal hidden behind the object-store interface
//! - Persistence mechanism independent of storage trait users

use super::{validate_path, ObjectStore};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// File names starting with this are in-flight writes, never objects
pub(crate) const TEMP_PREFIX: &str = ".tmp-";

/// File system store - each object is a file
/// Objects are stored as {base_path}/{container}/{object_path}
pub struct FileSystemStore {
    container_path: PathBuf,
}

impl FileSystemStore {
    pub fn new(base_path: impl Into<PathBuf>, container: &str) -> Self {
        Self {
            container_path: base_path.into().join(container),
        }
    }

    pub fn container_path(&self) -> &Path {
        &self.container_path
    }

    fn object_path(&self, path: &str) -> Result<PathBuf> {
        validate_path(path)?;
        Ok(self.container_path.join(path))
    }

    /// Deepest directory fully named by the prefix
    fn listing_root(&self, prefix: &str) -> PathBuf {
        match prefix.rfind('/') {
            Some(idx) => self.container_path.join(&prefix[..idx]),
            None => self.container_path.clone(),
        }
    }

    fn relative_name(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.container_path).ok()?;
        let segments: Option<Vec<&str>> = relative.iter().map(|s| s.to_str()).collect();
        Some(segments?.join("/"))
    }
}

#[async_trait]
impl ObjectStore for FileSystemStore {
    async fn ensure_container(&self) -> Result<()> {
        match fs::metadata(&self.container_path).await {
            Ok(meta) if meta.is_dir() => {
                tracing::info!(
                    "[FileSystemStore] Container {:?} already exists",
                    self.container_path
                );
                return Ok(());
            }
            Ok(_) => {
                return Err(StoreError::unavailable(
                    "ensure_container",
                    self.container_path.display().to_string(),
                    "exists but is not a directory",
                ))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StoreError::unavailable(
                    "ensure_container",
                    self.container_path.display().to_string(),
                    e,
                ))
            }
        }

        // create_dir_all tolerates a concurrent creator winning the race
        fs::create_dir_all(&self.container_path).await.map_err(|e| {
            StoreError::unavailable(
                "ensure_container",
                self.container_path.display().to_string(),
                e,
            )
        })?;
        tracing::info!("[FileSystemStore] Container {:?} created", self.container_path);
        Ok(())
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let file = self.object_path(path)?;
        let parent = file
            .parent()
            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::unavailable("put", path, e))?;

        // Readers only ever see the old or the new object, never a partial one
        let staging = parent.join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4()));
        let size = bytes.len();
        if let Err(e) = fs::write(&staging, bytes).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::unavailable("put", path, e));
        }
        if let Err(e) = fs::rename(&staging, &file).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::unavailable("put", path, e));
        }

        tracing::debug!("[FileSystemStore] Put '{}' ({} bytes) to {:?}", path, size, file);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let file = self.object_path(path)?;
        match fs::read(&file).await {
            Ok(bytes) => {
                tracing::debug!("[FileSystemStore] Read '{}' from {:?}", path, file);
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("[FileSystemStore] Object '{}' does not exist", path);
                Ok(None)
            }
            Err(e) => Err(StoreError::unavailable("get", path, e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let file = self.object_path(path)?;
        match fs::remove_file(&file).await {
            Ok(()) => {
                tracing::debug!("[FileSystemStore] Deleted '{}' at {:?}", path, file);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    "[FileSystemStore] Object '{}' does not exist, nothing to delete",
                    path
                );
                Ok(())
            }
            Err(e) => Err(StoreError::unavailable("delete", path, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        let mut pending = vec![self.listing_root(prefix)];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::unavailable("list", prefix, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::unavailable("list", prefix, e))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StoreError::unavailable("list", prefix, e))?;
                let entry_path = entry.path();

                let staging = entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX);
                if file_type.is_dir() {
                    pending.push(entry_path);
                } else if staging {
                    continue;
                } else if let Some(name) = self.relative_name(&entry_path) {
                    if name.starts_with(prefix) {
                        paths.push(name);
                    }
                }
            }
        }

        tracing::debug!("[FileSystemStore] Listed {} objects under '{}'", paths.len(), prefix);
        Ok(paths)
    }

    async fn exists(&self, path: &str) -> bool {
        match self.object_path(path) {
            Ok(file) => match fs::metadata(&file).await {
                Ok(meta) => meta.is_file(),
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => {
                    tracing::warn!(
                        "[FileSystemStore] Existence check failed for '{}': {}",
                        path,
                        e
                    );
                    false
                }
            },
            Err(e) => {
                tracing::warn!("[FileSystemStore] Existence check failed for '{}': {}", path, e);
                false
            }
        }
    }
}
