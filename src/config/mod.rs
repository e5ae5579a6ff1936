mod settings;

pub use settings::{LoggingConfig, OllamaConfig, Settings, StorageBackend, StorageConfig};
