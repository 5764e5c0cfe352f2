//! Storage error types for fpcache-storage.

use std::path::PathBuf;

use fpcache_core::CoreError;
use thiserror::Error;

/// Errors produced by fingerprinting and cache storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A registry-level error, such as an unknown function name.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Filesystem access failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored fingerprint is not a 64-character hex string.
    #[error("invalid fingerprint: '{value}'")]
    InvalidFingerprint { value: String },

    /// A source folder does not exist.
    #[error("source folder not found: {}", path.display())]
    MissingFolder { path: PathBuf },

    /// Walking a source folder failed.
    #[error("failed to walk source folder: {0}")]
    Walk(#[from] walkdir::Error),

    /// Moving a freshly written cache file into place failed.
    #[error("failed to persist cache entry: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
