// Module declarations
pub mod factory;
pub mod persistence;

// Re-export all implementations
pub use factory::{StorageBackend, StorageConfig, build_repository};
pub use persistence::{JsonFileNoteRepository, SqlNoteRepository};
