//! Hashing of raw-data source folders.
//!
//! A function may be backed by a folder of input files. Its content is part
//! of the function's fingerprint. Hashing file bytes is the only I/O the
//! fingerprint engine performs, so [`FolderHasher`] memoises the result per
//! folder and only re-reads files when the folder's modification signal
//! (relative paths, sizes and modification times) changes.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use walkdir::WalkDir;

use crate::error::StorageError;

/// Computes a content hash for a source folder.
///
/// Implementations must be deterministic for unchanged folder contents and
/// safe to call from several fingerprinting threads at once.
pub trait SourceFolderHasher: Send + Sync {
    fn hash_folder(&self, folder: &Path) -> Result<blake3::Hash, StorageError>;
}

/// A file found while walking a folder.
struct FolderFile {
    relative: String,
    path: PathBuf,
    size: u64,
    modified_nanos: u128,
}

#[derive(Debug, Clone, Copy)]
struct MemoEntry {
    signal: blake3::Hash,
    content: blake3::Hash,
}

/// Memoising [`SourceFolderHasher`] over the local filesystem.
#[derive(Debug, Default)]
pub struct FolderHasher {
    memo: DashMap<PathBuf, MemoEntry>,
}

impl FolderHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of folders with a memoised hash.
    pub fn cached_folders(&self) -> usize {
        self.memo.len()
    }

    fn walk(folder: &Path) -> Result<Vec<FolderFile>, StorageError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(folder).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = entry.metadata()?;
            let relative = entry
                .path()
                .strip_prefix(folder)
                .unwrap_or(entry.path())
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let modified_nanos = metadata
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |duration| duration.as_nanos());
            files.push(FolderFile {
                relative,
                path: entry.path().to_path_buf(),
                size: metadata.len(),
                modified_nanos,
            });
        }
        Ok(files)
    }

    fn signal(files: &[FolderFile]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for file in files {
            hasher.update(file.relative.as_bytes());
            hasher.update(&[0]);
            hasher.update(&file.size.to_le_bytes());
            hasher.update(&file.modified_nanos.to_le_bytes());
        }
        hasher.finalize()
    }

    fn content(files: &[FolderFile]) -> Result<blake3::Hash, StorageError> {
        let mut hasher = blake3::Hasher::new();
        for file in files {
            hasher.update(&(file.relative.len() as u64).to_le_bytes());
            hasher.update(file.relative.as_bytes());
            let mut file_hasher = blake3::Hasher::new();
            let reader = File::open(&file.path).map_err(|err| StorageError::io(&file.path, err))?;
            file_hasher
                .update_reader(reader)
                .map_err(|err| StorageError::io(&file.path, err))?;
            hasher.update(file_hasher.finalize().as_bytes());
        }
        Ok(hasher.finalize())
    }
}

impl SourceFolderHasher for FolderHasher {
    fn hash_folder(&self, folder: &Path) -> Result<blake3::Hash, StorageError> {
        if !folder.is_dir() {
            return Err(StorageError::MissingFolder {
                path: folder.to_path_buf(),
            });
        }

        let files = Self::walk(folder)?;
        let signal = Self::signal(&files);

        if let Some(entry) = self.memo.get(folder) {
            if entry.signal == signal {
                return Ok(entry.content);
            }
        }

        tracing::debug!(folder = %folder.display(), files = files.len(), "hashing source folder");
        let content = Self::content(&files)?;
        self.memo
            .insert(folder.to_path_buf(), MemoEntry { signal, content });
        Ok(content)
    }
}
