//! Deterministic blake3 composition for fingerprints.
//!
//! All hashing is deterministic: same content always produces the same hash.
//! This is ensured by:
//! - Sorting dependencies by name before combining
//! - Length-prefixing names so adjacent fields cannot run together
//! - Rendering arguments as JSON with sorted keys
//! - Never feeding wall-clock time or environment values into a hash

use std::collections::BTreeMap;

use crate::types::SHORT_LEN;

/// Domain separator for function fingerprints.
const FINGERPRINT_DOMAIN: &[u8] = b"fpcache-fingerprint-v1";

/// Stand-in for a source folder that could not be hashed.
pub const UNREADABLE_FOLDER: &[u8] = b"fpcache-unreadable-folder";

/// Hashes a function's own content: its source hash and, when it has one,
/// the hash of its source folder.
pub fn hash_content(source_hash: &blake3::Hash, folder_hash: Option<&blake3::Hash>) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source_hash.as_bytes());
    match folder_hash {
        Some(folder) => {
            hasher.update(&[1]);
            hasher.update(folder.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
    hasher.finalize()
}

/// Combines a function's content hash with the content hashes of its
/// effective dependencies.
///
/// `dependencies` may come in any order; they are sorted by name first so
/// graph iteration order never affects the result.
pub fn combine_fingerprint(
    content: &blake3::Hash,
    dependencies: &[(&str, blake3::Hash)],
) -> blake3::Hash {
    let mut sorted: Vec<&(&str, blake3::Hash)> = dependencies.iter().collect();
    sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut hasher = blake3::Hasher::new();
    hasher.update(FINGERPRINT_DOMAIN);
    hasher.update(content.as_bytes());
    hasher.update(&(sorted.len() as u64).to_le_bytes());
    for (name, hash) in sorted {
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update(hash.as_bytes());
    }
    hasher.finalize()
}

/// Short hash of call arguments, used to tell apart cache entries of the
/// same function called with different arguments.
///
/// Returns `None` for an empty argument map so argument-free calls keep the
/// plain file name.
pub fn hash_args(args: &BTreeMap<String, serde_json::Value>) -> Option<String> {
    if args.is_empty() {
        return None;
    }
    // BTreeMap keys and serde_json's default Map are both sorted.
    let canonical: serde_json::Map<String, serde_json::Value> =
        args.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    let text = serde_json::Value::Object(canonical).to_string();
    let mut hex = blake3::hash(text.as_bytes()).to_hex().to_string();
    hex.truncate(SHORT_LEN);
    Some(hex)
}
