//! One caching session over a fixed set of function sources.
//!
//! A session is built once: sources are registered, the dependency graph is
//! scanned and fingerprints are computed lazily as functions are looked up.
//! Source edits take effect in the next session.

use std::collections::BTreeMap;
use std::sync::Arc;

use fpcache_core::{DependencyGraph, DependencyInfo, Depth, Diagnostic, FunctionSource, Registry};
use fpcache_storage::{
    hash_args, CacheEntry, CacheKey, CacheStore, Fingerprint, FingerprintEngine, FolderHasher,
    FolderStore,
};

use crate::config::CacheConfig;
use crate::decision::{CacheDecision, CacheDecisionEngine};
use crate::error::CacheError;

/// A function call whose result may be cached.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    pub function: String,
    /// Call arguments. They select the entry but do not feed the fingerprint.
    pub args: BTreeMap<String, serde_json::Value>,
}

impl LookupRequest {
    pub fn new(function: impl Into<String>) -> Self {
        LookupRequest {
            function: function.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.args.insert(name.into(), value);
        self
    }
}

/// Result of [`CacheSession::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub decision: CacheDecision,
    /// Key for the current fingerprint; a fresh result belongs here.
    pub key: CacheKey,
    /// The reusable entry for `Hit` and `ForcedHit`, `None` for `Miss`.
    pub entry: Option<CacheEntry>,
}

#[derive(Debug)]
pub struct CacheSession {
    config: CacheConfig,
    fingerprints: FingerprintEngine,
}

impl CacheSession {
    /// Registers `sources` and prepares fingerprinting.
    ///
    /// Fails on the first source whose name has no known category or is
    /// registered twice.
    pub fn new<I>(sources: I, config: CacheConfig) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = FunctionSource>,
    {
        let registry = Registry::from_sources(sources)?;
        Self::from_registry(registry, config)
    }

    pub fn from_registry(registry: Registry, config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let graph = Arc::new(DependencyGraph::build(registry));
        tracing::info!(
            functions = graph.registry().len(),
            diagnostics = graph.diagnostics().len(),
            cache_type = %config.cache_type,
            "cache session ready"
        );
        let fingerprints = FingerprintEngine::new(graph, config.fingerprint_options())
            .with_folder_hasher(Arc::new(FolderHasher::new()));
        Ok(CacheSession {
            config,
            fingerprints,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        self.fingerprints.graph()
    }

    pub fn fingerprints(&self) -> &FingerprintEngine {
        &self.fingerprints
    }

    /// Recoverable issues found while registering and scanning.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.graph().diagnostics()
    }

    /// Functions `name` depends on, sorted by name.
    pub fn dependencies(&self, name: &str, depth: Depth) -> Result<Vec<DependencyInfo>, CacheError> {
        Ok(self.graph().dependencies(name, depth)?)
    }

    pub fn fingerprint(&self, name: &str) -> Result<Fingerprint, CacheError> {
        Ok(self.fingerprints.fingerprint(name)?)
    }

    /// Classifies a stored fingerprint under this session's configuration.
    pub fn decide(&self, name: &str, stored: Option<&str>) -> Result<CacheDecision, CacheError> {
        CacheDecisionEngine::new(&self.fingerprints).decide(
            name,
            stored,
            self.config.force_cache,
            self.config.cache_type,
        )
    }

    /// The key a result of `request` is stored under in this session.
    pub fn key(&self, request: &LookupRequest) -> Result<CacheKey, CacheError> {
        let fingerprint = self.fingerprint(&request.function)?;
        Ok(CacheKey::new(request.function.clone(), fingerprint).with_args_hash(hash_args(&request.args)))
    }

    /// Opens the folder store named by the configuration.
    pub fn open_store(&self) -> Result<FolderStore, CacheError> {
        self.config.store()
    }

    /// Looks `request` up in `store`.
    ///
    /// An entry under the current fingerprint is a `Hit`. Otherwise, when
    /// force-cache applies, the most recent entry for the same function and
    /// arguments is returned as `ForcedHit`.
    pub fn lookup<S>(&self, store: &S, request: &LookupRequest) -> Result<CacheLookup, CacheError>
    where
        S: CacheStore + ?Sized,
    {
        let key = self.key(request)?;

        let candidate = match store.get(&key)? {
            Some(entry) => Some(entry),
            None => store.latest(&key.function, key.args_hash.as_deref())?,
        };
        let stored = candidate.as_ref().map(|entry| entry.fingerprint.to_hex());
        let decision = self.decide(&request.function, stored.as_deref())?;

        let entry = if decision.is_reusable() { candidate } else { None };
        Ok(CacheLookup {
            decision,
            key,
            entry,
        })
    }

    /// Stores a freshly computed result under the current key.
    pub fn store_result<S>(
        &self,
        store: &mut S,
        request: &LookupRequest,
        payload: serde_json::Value,
    ) -> Result<CacheEntry, CacheError>
    where
        S: CacheStore + ?Sized,
    {
        let key = self.key(request)?;
        Ok(store.put(&key, payload)?)
    }
}
