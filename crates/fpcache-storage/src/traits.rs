//! The [`CacheStore`] trait: where computed results live.
//!
//! fpcache only decides whether a stored result may be reused. Persisting
//! results is delegated to a store, keyed by [`CacheKey`]. Backends are
//! swappable without touching the decision logic.

use crate::error::StorageError;
use crate::types::{CacheEntry, CacheKey};

/// Storage contract for cached computation results.
///
/// The trait is synchronous; the cached computations it gates are far more
/// expensive than a lookup.
pub trait CacheStore {
    /// Returns the entry stored under exactly `key`, if any.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError>;

    /// Returns the most recently written entry for `function` with the given
    /// argument hash, under any fingerprint.
    ///
    /// Used for forced reads, where a possibly stale entry is accepted.
    fn latest(
        &self,
        function: &str,
        args_hash: Option<&str>,
    ) -> Result<Option<CacheEntry>, StorageError>;

    /// Stores `payload` under `key`, replacing any entry with the same key.
    fn put(&mut self, key: &CacheKey, payload: serde_json::Value) -> Result<CacheEntry, StorageError>;

    /// Deletes the entry under `key`. Returns whether one existed.
    fn remove(&mut self, key: &CacheKey) -> Result<bool, StorageError>;
}
