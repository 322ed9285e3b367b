pub mod json_file_repository;
pub mod migrations;
pub mod sql_repository;


// Re-export both repository types
pub use json_file_repository::JsonFileNoteRepository;
pub use sql_repository::SqlNoteRepository;

use application::ApplicationError;
use std::fmt::Display;
use tracing::error;

/// Logs a backend failure and wraps it as an opaque storage error.
pub(crate) fn storage_error(context: &str, err: impl Display) -> ApplicationError {
    error!("{}: {}", context, err);
    ApplicationError::Storage(format!("{}: {}", context, err))
}
