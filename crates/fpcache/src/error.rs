use std::path::PathBuf;

use fpcache_core::CoreError;
use fpcache_storage::StorageError;

/// Errors surfaced by the session facade.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A configuration value could not be used.
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A revision-scoped cache was requested without naming a revision.
    #[error("revision-scoped cache requires a revision")]
    MissingRevision,
}
