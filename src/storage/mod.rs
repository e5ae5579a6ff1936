//! Object Store Abstraction
//!
//! Information Hiding:
//! - Backend transport, container layout and connection handling hidden behind trait
//! - Callers see a flat namespace of named byte blobs: put/get/delete/list-by-prefix
//! - Allows swapping between memory and filesystem containers without API changes

use crate::error::{Result, StoreError};
use async_trait::async_trait;

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemStore;
pub use memory::InMemoryStore;

/// Trait defining the four object-store primitives plus container bootstrap
///
/// `put` overwrites unconditionally (last writer wins). `get` reports absence
/// as `None`. `delete` of a missing object is not an error. `list` returns
/// paths in backend order, which callers must not rely on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the backing container if it does not exist yet
    async fn ensure_container(&self) -> Result<()>;

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()>;

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    async fn delete(&self, path: &str) -> Result<()>;

    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Existence check; failures degrade to `false`
    async fn exists(&self, path: &str) -> bool {
        match self.get(path).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::warn!("[ObjectStore] Existence check failed for '{}': {}", path, e);
                false
            }
        }
    }
}

/// Reject paths that are empty or could step outside the container
pub(crate) fn validate_path(path: &str) -> Result<()> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| {
                segment.is_empty()
                    || segment == "."
                    || segment == ".."
                    || segment.starts_with(filesystem::TEMP_PREFIX)
            });
    if bad {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}
