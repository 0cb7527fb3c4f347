//! Parallax artifact storage
//!
//! Filesystem half of the artifact store: deterministic file names under a
//! single artifact root, atomic writes (temp file + rename), and best-effort
//! removal. The database half lives in parallax-db; this crate never touches
//! the database.

mod paths;
mod root;

pub use paths::{artifact_file_name, sanitize_file_stem};
pub use root::ArtifactRoot;

use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for parallax_core::AppError {
    fn from(err: StorageError) -> Self {
        parallax_core::AppError::Storage(err.to_string())
    }
}
