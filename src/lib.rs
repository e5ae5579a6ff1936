//! blobchat - chat backend persisting sessions in a blob store
//!
//! Sessions, messages and per-session metadata are kept as individual JSON
//! objects in a flat object namespace. Queries are proxied to a locally
//! hosted inference service and the turn pair is recorded around the call.

mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod service;
pub mod storage;
pub mod store;
pub mod utils;

pub mod cli;

pub use self::config::{LoggingConfig, OllamaConfig, Settings, StorageBackend, StorageConfig};
pub use error::{Result, StoreError};
pub use models::{DeviceInfo, Message, Metadata, Role, Session, SessionPatch};
pub use service::{AssistantService, MessagePage, QueryReply, SessionCreated};
pub use store::{DocumentStore, Page};

use std::sync::Arc;
use storage::{FileSystemStore, InMemoryStore, ObjectStore};

/// Everything resolved once at startup and shared by all requests
#[derive(Clone)]
pub struct AppContext {
    settings: Arc<Settings>,
    service: AssistantService,
}

impl AppContext {
    /// Build the configured object store, make sure its container exists,
    /// and wire the service on top of it
    pub async fn init(settings: Settings) -> Result<Self> {
        let objects: Arc<dyn ObjectStore> = match settings.storage.backend {
            StorageBackend::FileSystem => Arc::new(FileSystemStore::new(
                settings.storage.root.clone(),
                &settings.storage.container,
            )),
            StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        };
        Self::with_store(settings, objects).await
    }

    /// Same as [`AppContext::init`] with a caller-supplied store
    pub async fn with_store(settings: Settings, objects: Arc<dyn ObjectStore>) -> Result<Self> {
        settings.validate()?;
        objects.ensure_container().await?;

        let store = DocumentStore::new(
            objects,
            settings.store_timeout(),
            settings.storage.list_concurrency,
        );
        let inference = inference::OllamaClient::new(&settings.ollama)?;

        tracing::info!(
            "blobchat context initialized (backend={:?}, container={})",
            settings.storage.backend,
            settings.storage.container
        );

        Ok(Self {
            settings: Arc::new(settings),
            service: AssistantService::new(store, inference),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn service(&self) -> &AssistantService {
        &self.service
    }
}
