use crate::error::StoreError;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub storage: StorageConfig,
    pub ollama: OllamaConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    FileSystem,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding containers when the filesystem backend is used
    pub root: PathBuf,
    pub container: String,
    pub timeout_ms: u64,
    /// Upper bound on concurrent object fetches while listing
    pub list_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub default_model: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Self::defaults()?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("storage.backend", "filesystem")?
            .set_default("storage.root", "./data")?
            .set_default("storage.container", "ai-assistant-data")?
            .set_default("storage.timeout_ms", 10_000_i64)?
            .set_default("storage.list_concurrency", 8_i64)?
            .set_default("ollama.url", "http://localhost:11434")?
            .set_default("ollama.default_model", "llama3")?
            .set_default("ollama.timeout_ms", 120_000_i64)?
            .set_default("logging.level", "info")
    }

    /// Reject settings that would make every store or inference call fail
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.storage.container.trim().is_empty() {
            return Err(StoreError::Config("storage.container must not be empty".into()));
        }
        if self.storage.timeout_ms == 0 {
            return Err(StoreError::Config("storage.timeout_ms must be positive".into()));
        }
        if self.storage.list_concurrency == 0 {
            return Err(StoreError::Config(
                "storage.list_concurrency must be at least 1".into(),
            ));
        }
        if self.ollama.timeout_ms == 0 {
            return Err(StoreError::Config("ollama.timeout_ms must be positive".into()));
        }
        reqwest::Url::parse(&self.ollama.url).map_err(|e| {
            StoreError::Config(format!("ollama.url '{}' is invalid: {}", self.ollama.url, e))
        })?;
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.timeout_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::FileSystem,
                root: PathBuf::from("./data"),
                container: "ai-assistant-data".to_string(),
                timeout_ms: 10_000,
                list_concurrency: 8,
            },
            ollama: OllamaConfig {
                url: "http://localhost:11434".to_string(),
                default_model: "llama3".to_string(),
                timeout_ms: 120_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize_without_file() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.storage.backend, StorageBackend::FileSystem);
        assert_eq!(settings.storage.container, "ai-assistant-data");
        assert_eq!(settings.storage.list_concurrency, 8);
        assert_eq!(settings.ollama.url, "http://localhost:11434");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut settings = Settings::default();
        settings.storage.list_concurrency = 0;
        assert!(matches!(settings.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut settings = Settings::default();
        settings.ollama.url = "not a url".to_string();
        assert!(matches!(settings.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn test_memory_backend_parses() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .set_override("storage.backend", "memory")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
    }
}
