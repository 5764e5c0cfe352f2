//! Cache folder backend: one JSON file per entry.
//!
//! Layout under the cache folder:
//!
//! ```text
//! <root>/<function>-F<fp16>[-<args>].json       shared cache
//! <root>/rev<revision>/<function>-F<fp16>...    revision-scoped cache
//! ```
//!
//! Writes go through a temporary file in the same directory and are renamed
//! into place, so a reader never sees a half-written entry.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::StorageError;
use crate::traits::CacheStore;
use crate::types::{file_stem_prefix, CacheEntry, CacheKey, SHORT_LEN};

/// [`CacheStore`] over a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FolderStore {
    root: PathBuf,
}

impl FolderStore {
    /// A store writing directly into `root`. The folder is created on first
    /// write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FolderStore { root: root.into() }
    }

    /// A store namespaced to one revision: `root/rev<revision>`.
    ///
    /// Characters other than ASCII alphanumerics, `.` and `_` in `revision`
    /// become `_`, so the namespace is always a single folder inside `root`.
    pub fn for_revision(root: impl AsRef<Path>, revision: &str) -> Self {
        FolderStore {
            root: root
                .as_ref()
                .join(format!("rev{}", file_stem_prefix(revision))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the entry for `key` is stored at.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn read_entry(path: &Path) -> Result<Option<CacheEntry>, StorageError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(path, err)),
        };
        match serde_json::from_str(&data) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }
}

/// Whether `file_name` is an entry file for `prefix` with the given
/// argument hash.
fn matches_entry(file_name: &str, prefix: &str, args_hash: Option<&str>) -> bool {
    let Some(rest) = file_name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix("-F"))
        .and_then(|rest| rest.strip_suffix(".json"))
    else {
        return false;
    };
    if rest.len() < SHORT_LEN || !rest.is_char_boundary(SHORT_LEN) {
        return false;
    }
    let (fingerprint, tail) = rest.split_at(SHORT_LEN);
    if !fingerprint.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }
    match args_hash {
        None => tail.is_empty(),
        Some(args) => tail.strip_prefix('-') == Some(args),
    }
}

impl CacheStore for FolderStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
        let path = self.entry_path(key);
        // File names carry a shortened fingerprint; the full one is checked
        // against the stored entry.
        Ok(Self::read_entry(&path)?.filter(|entry| entry.fingerprint == key.fingerprint))
    }

    fn latest(
        &self,
        function: &str,
        args_hash: Option<&str>,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let listing = match fs::read_dir(&self.root) {
            Ok(listing) => listing,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(&self.root, err)),
        };

        let prefix = file_stem_prefix(function);
        let mut candidates: Vec<(SystemTime, String, PathBuf)> = Vec::new();
        for item in listing {
            let item = item.map_err(|err| StorageError::io(&self.root, err))?;
            let file_name = item.file_name().to_string_lossy().into_owned();
            if !matches_entry(&file_name, &prefix, args_hash) {
                continue;
            }
            let modified = item
                .metadata()
                .and_then(|meta| meta.modified())
                .map_err(|err| StorageError::io(item.path(), err))?;
            candidates.push((modified, file_name, item.path()));
        }
        candidates.sort();

        // Newest first; distinct functions can share a sanitised prefix and
        // unreadable files are skipped.
        for (_, _, path) in candidates.into_iter().rev() {
            match Self::read_entry(&path)? {
                Some(entry) if entry.function == function => return Ok(Some(entry)),
                _ => continue,
            }
        }
        Ok(None)
    }

    fn put(&mut self, key: &CacheKey, payload: serde_json::Value) -> Result<CacheEntry, StorageError> {
        fs::create_dir_all(&self.root).map_err(|err| StorageError::io(&self.root, err))?;

        let entry = CacheEntry::new(key, payload);
        let json = serde_json::to_vec_pretty(&entry)?;

        let path = self.entry_path(key);
        let mut temp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|err| StorageError::io(&self.root, err))?;
        temp.write_all(&json)
            .map_err(|err| StorageError::io(temp.path(), err))?;
        temp.persist(&path)?;

        tracing::debug!(function = %key.function, path = %path.display(), "stored cache entry");
        Ok(entry)
    }

    fn remove(&mut self, key: &CacheKey) -> Result<bool, StorageError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::io(path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fingerprint;
    use serde_json::json;
    use std::time::Duration;

    fn key(function: &str, version: &str) -> CacheKey {
        CacheKey::new(function, Fingerprint::from(blake3::hash(version.as_bytes())))
    }

    fn touch(path: &Path, modified: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    #[test]
    fn put_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FolderStore::new(dir.path().join("cache"));
        let k = key("calcExample", "v1");
        store.put(&k, json!({"value": 1})).unwrap();

        let expected = dir
            .path()
            .join("cache")
            .join(format!("calcExample-F{}.json", k.fingerprint.short()));
        assert!(expected.is_file());
        assert_eq!(store.get(&k).unwrap().unwrap().payload, json!({"value": 1}));
    }

    #[test]
    fn get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FolderStore::new(dir.path());
        assert!(store.get(&key("calcExample", "v1")).unwrap().is_none());
        assert!(store.latest("calcExample", None).unwrap().is_none());
    }

    #[test]
    fn revision_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FolderStore::for_revision(dir.path(), "0.42");
        assert_eq!(store.root(), dir.path().join("rev0.42"));

        let k = key("calcExample", "v1");
        store.put(&k, json!(1)).unwrap();
        assert!(FolderStore::new(dir.path()).get(&k).unwrap().is_none());
    }

    #[test]
    fn latest_prefers_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FolderStore::new(dir.path());
        let old = key("calcExample", "v1");
        let new = key("calcExample", "v2");
        store.put(&old, json!("old")).unwrap();
        store.put(&new, json!("new")).unwrap();

        let now = SystemTime::now();
        touch(&store.entry_path(&old), now - Duration::from_secs(60));
        touch(&store.entry_path(&new), now);

        let latest = store.latest("calcExample", None).unwrap().unwrap();
        assert_eq!(latest.payload, json!("new"));
    }

    #[test]
    fn latest_respects_args_and_function() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FolderStore::new(dir.path());
        let with_args = key("calcExample", "v1").with_args_hash(Some("abcdef0123456789".into()));
        store.put(&with_args, json!("args")).unwrap();
        store.put(&key("calcExample2", "v1"), json!("other")).unwrap();

        assert!(store.latest("calcExample", None).unwrap().is_none());
        let found = store
            .latest("calcExample", Some("abcdef0123456789"))
            .unwrap()
            .unwrap();
        assert_eq!(found.payload, json!("args"));
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FolderStore::new(dir.path());
        let k = key("calcExample", "v1");
        store.put(&k, json!(null)).unwrap();
        assert!(store.remove(&k).unwrap());
        assert!(!store.remove(&k).unwrap());
        assert!(!store.entry_path(&k).exists());
    }

    #[test]
    fn entry_file_matching() {
        let fp = "0123456789abcdef";
        assert!(matches_entry(&format!("calcX-F{fp}.json"), "calcX", None));
        assert!(matches_entry(&format!("calcX-F{fp}-aa.json"), "calcX", Some("aa")));
        assert!(!matches_entry(&format!("calcX-F{fp}-aa.json"), "calcX", None));
        assert!(!matches_entry(&format!("calcXY-F{fp}.json"), "calcX", None));
        assert!(!matches_entry("calcX-Fnothex.json", "calcX", None));
    }

    #[test]
    fn corrupt_entries_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FolderStore::new(dir.path());
        let old = key("calcExample", "v1");
        let new = key("calcExample", "v2");
        store.put(&old, json!("old")).unwrap();
        store.put(&new, json!("new")).unwrap();

        let now = SystemTime::now();
        touch(&store.entry_path(&old), now - Duration::from_secs(60));
        fs::write(store.entry_path(&new), "{truncated").unwrap();
        touch(&store.entry_path(&new), now);

        assert!(store.get(&new).unwrap().is_none());
        let latest = store.latest("calcExample", None).unwrap().unwrap();
        assert_eq!(latest.payload, json!("old"));

        // Rewriting replaces the corrupt file.
        store.put(&new, json!("fresh")).unwrap();
        assert_eq!(store.get(&new).unwrap().unwrap().payload, json!("fresh"));
    }

    #[test]
    fn revision_cannot_leave_the_cache_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let store = FolderStore::for_revision(&root, "/../../escape");
        assert_eq!(store.root().parent(), Some(root.as_path()));
        assert_eq!(store.root(), root.join("rev_.._.._escape"));
    }
}
