//! In-memory implementation of [`CacheStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and for pipelines
//! that only need caching within one process. It has the same semantics as
//! [`FolderStore`](crate::files::FolderStore).

use std::collections::HashMap;

use crate::error::StorageError;
use crate::traits::CacheStore;
use crate::types::{CacheEntry, CacheKey};

/// Entries grouped by (function, args hash), oldest first.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: HashMap<(String, Option<String>), Vec<CacheEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(key: &CacheKey) -> (String, Option<String>) {
        (key.function.clone(), key.args_hash.clone())
    }
}

impl CacheStore for InMemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self.entries.get(&Self::slot(key)).and_then(|entries| {
            entries
                .iter()
                .find(|entry| entry.fingerprint == key.fingerprint)
                .cloned()
        }))
    }

    fn latest(
        &self,
        function: &str,
        args_hash: Option<&str>,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let slot = (function.to_string(), args_hash.map(str::to_string));
        Ok(self
            .entries
            .get(&slot)
            .and_then(|entries| entries.last())
            .cloned())
    }

    fn put(&mut self, key: &CacheKey, payload: serde_json::Value) -> Result<CacheEntry, StorageError> {
        let entry = CacheEntry::new(key, payload);
        let entries = self.entries.entry(Self::slot(key)).or_default();
        entries.retain(|existing| existing.fingerprint != key.fingerprint);
        entries.push(entry.clone());
        Ok(entry)
    }

    fn remove(&mut self, key: &CacheKey) -> Result<bool, StorageError> {
        let Some(entries) = self.entries.get_mut(&Self::slot(key)) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|existing| existing.fingerprint != key.fingerprint);
        Ok(entries.len() != before)
    }
}
