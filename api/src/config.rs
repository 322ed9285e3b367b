// ./api/src/config.rs
use application::ApplicationError;
use infrastructure::{StorageBackend, StorageConfig, factory};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8080;

/// Process configuration, read from the environment (and an optional `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ApplicationError> {
        match dotenv::dotenv() {
            Ok(path) => info!("Loaded environment from {}", path.display()),
            Err(_) => info!(".env file not found, using process environment only"),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApplicationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match get("PORT") {
            Some(port_str) => match u16::from_str(port_str.trim()) {
                Ok(port_num) => {
                    info!("Using port {} from environment variable PORT.", port_num);
                    port_num
                }
                Err(_) => {
                    warn!(
                        "Invalid PORT value '{}' in environment variable. Using default port {}.",
                        port_str, DEFAULT_PORT
                    );
                    DEFAULT_PORT
                }
            },
            None => {
                info!(
                    "PORT environment variable not set. Using default port {}.",
                    DEFAULT_PORT
                );
                DEFAULT_PORT
            }
        };

        // An unknown backend is a startup error, not something to guess around
        let backend = match get("STORAGE_TYPE") {
            Some(value) => StorageBackend::from_str(&value)?,
            None => StorageBackend::default(),
        };

        let storage = StorageConfig {
            backend,
            file_path: get("STORAGE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(factory::DEFAULT_STORAGE_FILE)),
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| factory::DEFAULT_DATABASE_URL.to_string()),
        };

        Ok(Self { port, storage })
    }
}
