//! Fingerprinting and cache storage for fpcache.
//!
//! Turns a [`DependencyGraph`](fpcache_core::DependencyGraph) into per-function
//! fingerprints and persists computation results keyed by them.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: Fingerprint, CacheKey, CacheEntry
//! - [`hash`]: blake3 combination primitives
//! - [`folder`]: memoised hashing of raw-data source folders
//! - [`fingerprint`]: the memoised, cycle-safe FingerprintEngine
//! - [`dirty`]: fingerprint snapshots and stale-set computation
//! - [`traits`]: CacheStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`files`]: FolderStore implementation

pub mod dirty;
pub mod error;
pub mod files;
pub mod fingerprint;
pub mod folder;
pub mod hash;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use dirty::{compute_stale_set, FingerprintSnapshot, SnapshotEntry, StaleSet};
pub use error::StorageError;
pub use files::FolderStore;
pub use fingerprint::{FingerprintEngine, FingerprintOptions, FingerprintReport, IgnoreScope};
pub use folder::{FolderHasher, SourceFolderHasher};
pub use hash::hash_args;
pub use memory::InMemoryStore;
pub use traits::CacheStore;
pub use types::{CacheEntry, CacheKey, Fingerprint};
