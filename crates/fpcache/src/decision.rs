//! Whether a stored result may be reused.
//!
//! | stored entry            | shared, no force | shared + force | revision-scoped |
//! |-------------------------|------------------|----------------|-----------------|
//! | none                    | Miss             | Miss           | Miss            |
//! | same fingerprint        | Hit              | Hit            | Hit             |
//! | different fingerprint   | Miss             | ForcedHit      | ForcedHit       |
//!
//! The engine only reads; writing results back is up to the caller.

use std::fmt;
use std::str::FromStr;

use fpcache_storage::{Fingerprint, FingerprintEngine};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Scope of a cache folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheKind {
    /// One cache for every code revision; entries are keyed by fingerprint.
    #[default]
    Shared,
    /// One cache per revision. Entries are trusted within the revision, so
    /// force-cache is always on.
    #[serde(alias = "rev")]
    RevisionScoped,
}

impl CacheKind {
    pub fn implies_force(self) -> bool {
        matches!(self, CacheKind::RevisionScoped)
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheKind::Shared => "shared",
            CacheKind::RevisionScoped => "revision-scoped",
        })
    }
}

impl FromStr for CacheKind {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(CacheKind::Shared),
            "revision-scoped" | "rev" => Ok(CacheKind::RevisionScoped),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown cache type '{other}' (expected 'shared' or 'revision-scoped')"
            ))),
        }
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDecision {
    /// The stored entry was computed under the current fingerprint.
    Hit,
    /// Nothing usable is stored; compute and write.
    Miss,
    /// A stored entry with a different fingerprint is used anyway.
    ForcedHit,
}

impl CacheDecision {
    /// Whether the stored entry is returned instead of recomputing.
    pub fn is_reusable(self) -> bool {
        !matches!(self, CacheDecision::Miss)
    }
}

/// Decides cache freshness from current fingerprints.
#[derive(Debug, Clone, Copy)]
pub struct CacheDecisionEngine<'a> {
    fingerprints: &'a FingerprintEngine,
}

impl<'a> CacheDecisionEngine<'a> {
    pub fn new(fingerprints: &'a FingerprintEngine) -> Self {
        CacheDecisionEngine { fingerprints }
    }

    /// Classifies the entry stored for `name`, given as the hex fingerprint
    /// it was written under.
    pub fn decide(
        &self,
        name: &str,
        stored: Option<&str>,
        force_cache: bool,
        kind: CacheKind,
    ) -> Result<CacheDecision, CacheError> {
        let current = self.fingerprints.fingerprint(name)?;
        Ok(classify(name, &current, stored, force_cache, kind))
    }
}

pub(crate) fn classify(
    name: &str,
    current: &Fingerprint,
    stored: Option<&str>,
    force_cache: bool,
    kind: CacheKind,
) -> CacheDecision {
    let Some(stored) = stored else {
        tracing::debug!(function = name, "cache miss: nothing stored");
        return CacheDecision::Miss;
    };

    if stored.eq_ignore_ascii_case(&current.to_hex()) {
        tracing::debug!(function = name, fingerprint = %current.short(), "cache hit");
        return CacheDecision::Hit;
    }

    if force_cache || kind.implies_force() {
        tracing::warn!(
            function = name,
            stored = stored,
            current = %current,
            cache_type = %kind,
            "force-cache: using a cache entry computed under a different fingerprint"
        );
        CacheDecision::ForcedHit
    } else {
        tracing::debug!(function = name, stored = stored, current = %current, "cache miss: fingerprint changed");
        CacheDecision::Miss
    }
}
