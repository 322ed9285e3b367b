// ./infrastructure/src/factory.rs
use crate::persistence::{JsonFileNoteRepository, SqlNoteRepository};
use application::{ApplicationError, NoteRepository};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

pub const DEFAULT_STORAGE_FILE: &str = "storage/notes.json";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://storage/notes.db";

/// Which note store implementation to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// In-memory map mirrored to a JSON file.
    #[default]
    File,
    /// SQL table accessed through a connection pool.
    Relational,
}

impl FromStr for StorageBackend {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Self::File),
            "relational" | "sql" | "sqlite" => Ok(Self::Relational),
            other => Err(ApplicationError::InvalidInput(format!(
                "unsupported storage type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Relational => write!(f, "relational"),
        }
    }
}

/// Settings consumed by [`build_repository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Path of the JSON document (file backend).
    pub file_path: PathBuf,
    /// sqlx SQLite connection string (relational backend).
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            file_path: PathBuf::from(DEFAULT_STORAGE_FILE),
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::File,
            file_path: path.into(),
            ..Self::default()
        }
    }

    pub fn relational(database_url: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Relational,
            database_url: database_url.into(),
            ..Self::default()
        }
    }
}

/// Opens the store selected by `config`. Any failure here is fatal for startup.
#[instrument(skip(config), fields(backend = %config.backend))]
pub async fn build_repository(
    config: &StorageConfig,
) -> Result<Arc<dyn NoteRepository>, ApplicationError> {
    let repo: Arc<dyn NoteRepository> = match config.backend {
        StorageBackend::File => {
            info!(path = %config.file_path.display(), "Using JSON file storage");
            Arc::new(JsonFileNoteRepository::open(config.file_path.clone()).await?)
        }
        StorageBackend::Relational => {
            info!("Using relational storage");
            Arc::new(SqlNoteRepository::connect(&config.database_url).await?)
        }
    };
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::NoteDraft;
    use tempfile::TempDir;

    #[test]
    fn backend_parsing() {
        assert_eq!("file".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert_eq!("JSON".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert_eq!(
            " relational ".parse::<StorageBackend>().unwrap(),
            StorageBackend::Relational
        );
        assert_eq!(
            "sqlite".parse::<StorageBackend>().unwrap(),
            StorageBackend::Relational
        );
        assert!(matches!(
            "mongo".parse::<StorageBackend>(),
            Err(ApplicationError::InvalidInput(msg)) if msg.contains("mongo")
        ));
    }

    #[test]
    fn config_constructors_pick_backend() {
        let config = StorageConfig::file("/tmp/x.json");
        assert_eq!(config.backend, StorageBackend::File);
        assert_eq!(config.file_path, PathBuf::from("/tmp/x.json"));
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);

        let config = StorageConfig::relational("sqlite::memory:");
        assert_eq!(config.backend, StorageBackend::Relational);
        assert_eq!(config.file_path, PathBuf::from(DEFAULT_STORAGE_FILE));
    }

    #[tokio::test]
    async fn builds_each_backend() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        let repo = build_repository(&StorageConfig::file(&path)).await.unwrap();
        repo.create(&NoteDraft::new("A", "1")).await.unwrap();
        assert!(path.exists());

        let repo = build_repository(&StorageConfig::relational("sqlite::memory:"))
            .await
            .unwrap();
        let note = repo.create(&NoteDraft::new("A", "1")).await.unwrap();
        assert_eq!(repo.get_by_id(note.id()).await.unwrap(), note);
    }

    #[tokio::test]
    async fn corrupt_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, "[{").unwrap();
        let result = build_repository(&StorageConfig::file(&path)).await;
        assert!(matches!(result, Err(ApplicationError::Storage(_))));
    }
}
