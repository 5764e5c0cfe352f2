//! Stale-set detection between sessions.
//!
//! A [`FingerprintSnapshot`] records every function's source hash and
//! fingerprint at the end of a session. Comparing a later session against it
//! tells which cached results can no longer be trusted, and why: the
//! function's own source changed, or only something it depends on did.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::fingerprint::FingerprintEngine;
use crate::types::Fingerprint;

/// What was recorded for one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Hex blake3 of the function source.
    pub source_hash: String,
    pub fingerprint: Fingerprint,
}

/// Source hashes and fingerprints of a whole session, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintSnapshot {
    functions: BTreeMap<String, SnapshotEntry>,
}

impl FingerprintSnapshot {
    /// Records every function known to `engine`.
    pub fn capture(engine: &FingerprintEngine) -> Self {
        let functions = engine
            .graph()
            .registry()
            .iter()
            .map(|descriptor| {
                (
                    descriptor.name.clone(),
                    SnapshotEntry {
                        source_hash: descriptor.source_hash.to_hex().to_string(),
                        fingerprint: engine.fingerprint_of(descriptor.id),
                    },
                )
            })
            .collect();
        FingerprintSnapshot { functions }
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Save the snapshot to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|err| StorageError::io(path, err))
    }

    /// Load a snapshot from a JSON file.
    ///
    /// Returns `None` if the file doesn't exist or can't be parsed; a missing
    /// snapshot simply means every function counts as new.
    pub fn load(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "discarding unreadable fingerprint snapshot");
                None
            }
        }
    }
}

/// Functions whose cached results are stale, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaleSet {
    /// Not present in the previous snapshot.
    pub new: Vec<String>,
    /// Own source text changed.
    pub source_changed: Vec<String>,
    /// Own source unchanged, but an effective dependency changed.
    pub dependency_changed: Vec<String>,
    /// Present in the previous snapshot but no longer registered.
    pub removed: Vec<String>,
    /// Fingerprint unchanged; cached results remain valid.
    pub unchanged: Vec<String>,
}

impl StaleSet {
    /// Returns all functions needing recomputation (new + changed), sorted.
    pub fn needs_recompute(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .new
            .iter()
            .chain(&self.source_changed)
            .chain(&self.dependency_changed)
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Returns true if nothing changed.
    pub fn is_clean(&self) -> bool {
        self.new.is_empty()
            && self.source_changed.is_empty()
            && self.dependency_changed.is_empty()
            && self.removed.is_empty()
    }

    /// Total count of stale functions (new + changed + removed).
    pub fn total(&self) -> usize {
        self.new.len() + self.source_changed.len() + self.dependency_changed.len() + self.removed.len()
    }
}

/// Compares the current session against a previous snapshot.
pub fn compute_stale_set(engine: &FingerprintEngine, previous: &FingerprintSnapshot) -> StaleSet {
    let current = FingerprintSnapshot::capture(engine);
    let mut stale = StaleSet::default();

    // BTreeMap iteration keeps every list sorted.
    for (name, entry) in &current.functions {
        match previous.get(name) {
            None => stale.new.push(name.clone()),
            Some(before) if before.fingerprint == entry.fingerprint => {
                stale.unchanged.push(name.clone());
            }
            Some(before) if before.source_hash != entry.source_hash => {
                stale.source_changed.push(name.clone());
            }
            Some(_) => stale.dependency_changed.push(name.clone()),
        }
    }

    for name in previous.functions.keys() {
        if current.get(name).is_none() {
            stale.removed.push(name.clone());
        }
    }

    tracing::debug!(
        new = stale.new.len(),
        source_changed = stale.source_changed.len(),
        dependency_changed = stale.dependency_changed.len(),
        removed = stale.removed.len(),
        "computed stale set"
    );
    stale
}
