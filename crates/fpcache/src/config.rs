//! Cache configuration.
//!
//! Loaded from a JSON file, then overridden by environment variables:
//!
//! - `FPCACHE_CACHE_FOLDER`: cache folder path
//! - `FPCACHE_CACHE_TYPE`: `shared` or `revision-scoped`
//! - `FPCACHE_FORCE_CACHE`: `true`/`false` (also `1`/`0`, `yes`/`no`)
//! - `FPCACHE_REVISION`: revision naming the revision-scoped namespace
//! - `FPCACHE_IGNORE_SCOPE`: `local` or `shadowing`

use std::path::{Path, PathBuf};

use fpcache_storage::{FingerprintOptions, FolderStore, IgnoreScope};
use serde::{Deserialize, Serialize};

use crate::decision::CacheKind;
use crate::error::CacheError;

pub const ENV_CACHE_FOLDER: &str = "FPCACHE_CACHE_FOLDER";
pub const ENV_CACHE_TYPE: &str = "FPCACHE_CACHE_TYPE";
pub const ENV_FORCE_CACHE: &str = "FPCACHE_FORCE_CACHE";
pub const ENV_REVISION: &str = "FPCACHE_REVISION";
pub const ENV_IGNORE_SCOPE: &str = "FPCACHE_IGNORE_SCOPE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(rename = "cachefolder")]
    pub cache_folder: Option<PathBuf>,
    #[serde(rename = "cachetype")]
    pub cache_type: CacheKind,
    #[serde(rename = "forcecache")]
    pub force_cache: bool,
    pub revision: Option<String>,
    #[serde(rename = "ignorescope")]
    pub ignore_scope: IgnoreScope,
}

impl CacheConfig {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, CacheError> {
        let data = std::fs::read_to_string(path).map_err(|source| CacheError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CacheConfig = serde_json::from_str(&data)
            .map_err(|err| CacheError::InvalidConfig(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with process environment overrides.
    pub fn from_env() -> Result<Self, CacheError> {
        CacheConfig::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`, keyed by the
    /// `FPCACHE_*` variable names.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, CacheError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(folder) = lookup(ENV_CACHE_FOLDER) {
            self.cache_folder = Some(PathBuf::from(folder));
        }
        if let Some(kind) = lookup(ENV_CACHE_TYPE) {
            self.cache_type = kind.parse()?;
        }
        if let Some(force) = lookup(ENV_FORCE_CACHE) {
            self.force_cache = parse_bool(ENV_FORCE_CACHE, &force)?;
        }
        if let Some(revision) = lookup(ENV_REVISION) {
            self.revision = Some(revision);
        }
        if let Some(scope) = lookup(ENV_IGNORE_SCOPE) {
            self.ignore_scope = parse_ignore_scope(&scope)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that the settings fit together.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.cache_type == CacheKind::RevisionScoped
            && self
                .revision
                .as_deref()
                .filter(|rev| !rev.trim().is_empty())
                .is_none()
        {
            return Err(CacheError::MissingRevision);
        }
        if let Some(revision) = &self.revision {
            if revision.contains(['/', '\\']) {
                return Err(CacheError::InvalidConfig(format!(
                    "revision '{revision}' must not contain path separators"
                )));
            }
        }
        Ok(())
    }

    /// Whether stale entries are returned instead of recomputed.
    pub fn effective_force(&self) -> bool {
        self.force_cache || self.cache_type.implies_force()
    }

    pub fn fingerprint_options(&self) -> FingerprintOptions {
        FingerprintOptions {
            ignore_scope: self.ignore_scope,
        }
    }

    /// Opens the folder store this configuration points at.
    pub fn store(&self) -> Result<FolderStore, CacheError> {
        let folder = self
            .cache_folder
            .as_deref()
            .ok_or_else(|| CacheError::InvalidConfig("cachefolder is not set".into()))?;
        match self.cache_type {
            CacheKind::Shared => Ok(FolderStore::new(folder)),
            CacheKind::RevisionScoped => {
                let revision = self.revision.as_deref().ok_or(CacheError::MissingRevision)?;
                Ok(FolderStore::for_revision(folder, revision))
            }
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CacheError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(CacheError::InvalidConfig(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

fn parse_ignore_scope(value: &str) -> Result<IgnoreScope, CacheError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "local" => Ok(IgnoreScope::Local),
        "shadowing" => Ok(IgnoreScope::Shadowing),
        other => Err(CacheError::InvalidConfig(format!(
            "unknown ignore scope '{other}' (expected 'local' or 'shadowing')"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_type, CacheKind::Shared);
        assert!(!config.force_cache);
        assert!(!config.effective_force());
        assert_eq!(config.ignore_scope, IgnoreScope::Local);
    }

    #[test]
    fn from_file_with_partial_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fpcache.json");
        std::fs::write(&path, r#"{"cachefolder": "/tmp/cache", "forcecache": true}"#).unwrap();

        let config = CacheConfig::from_file(&path).unwrap();
        assert_eq!(config.cache_folder, Some(PathBuf::from("/tmp/cache")));
        assert!(config.force_cache);
        assert_eq!(config.cache_type, CacheKind::Shared);
    }

    #[test]
    fn from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            CacheConfig::from_file(&missing),
            Err(CacheError::ConfigIo { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"cachetype": "global"}"#).unwrap();
        assert!(matches!(
            CacheConfig::from_file(&bad),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let config = CacheConfig {
            cache_folder: Some("/from/file".into()),
            ..CacheConfig::default()
        }
        .with_env_overrides(env(&[
            (ENV_CACHE_FOLDER, "/from/env"),
            (ENV_CACHE_TYPE, "rev"),
            (ENV_REVISION, "0.42"),
            (ENV_FORCE_CACHE, "no"),
            (ENV_IGNORE_SCOPE, "shadowing"),
        ]))
        .unwrap();

        assert_eq!(config.cache_folder, Some(PathBuf::from("/from/env")));
        assert_eq!(config.cache_type, CacheKind::RevisionScoped);
        assert_eq!(config.revision.as_deref(), Some("0.42"));
        assert!(!config.force_cache);
        assert!(config.effective_force());
        assert_eq!(config.ignore_scope, IgnoreScope::Shadowing);
    }

    #[test]
    fn invalid_env_values() {
        let err = CacheConfig::default()
            .with_env_overrides(env(&[(ENV_FORCE_CACHE, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));

        let err = CacheConfig::default()
            .with_env_overrides(env(&[(ENV_IGNORE_SCOPE, "global")]))
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[test]
    fn revision_scoped_needs_revision() {
        let err = CacheConfig::default()
            .with_env_overrides(env(&[(ENV_CACHE_TYPE, "revision-scoped")]))
            .unwrap_err();
        assert!(matches!(err, CacheError::MissingRevision));
    }

    #[test]
    fn revision_with_path_separators_is_rejected() {
        for revision in ["../outside", "a\\b", "/abs"] {
            let err = CacheConfig::default()
                .with_env_overrides(env(&[(ENV_CACHE_TYPE, "rev"), (ENV_REVISION, revision)]))
                .unwrap_err();
            assert!(matches!(err, CacheError::InvalidConfig(_)), "{revision}");
        }
    }

    #[test]
    fn store_layout() {
        let shared = CacheConfig {
            cache_folder: Some("/cache".into()),
            ..CacheConfig::default()
        };
        assert_eq!(shared.store().unwrap().root(), Path::new("/cache"));

        let scoped = CacheConfig {
            cache_type: CacheKind::RevisionScoped,
            revision: Some("7".into()),
            ..shared.clone()
        };
        assert_eq!(scoped.store().unwrap().root(), Path::new("/cache/rev7"));

        assert!(matches!(
            CacheConfig::default().store(),
            Err(CacheError::InvalidConfig(_))
        ));
    }
}
