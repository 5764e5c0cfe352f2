//! Storage-layer value types: fingerprints and cache entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Number of hex characters of a fingerprint used in cache file names.
pub const SHORT_LEN: usize = 16;

/// A function fingerprint: 32 bytes of blake3 output.
///
/// Serialized and displayed as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    /// Hex prefix used to name cache files.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_LEN);
        hex
    }

    /// Parses the hex form produced by [`to_hex`](Self::to_hex).
    pub fn from_hex(value: &str) -> Result<Self, StorageError> {
        blake3::Hash::from_hex(value)
            .map(|hash| Fingerprint(*hash.as_bytes()))
            .map_err(|_| StorageError::InvalidFingerprint {
                value: value.to_string(),
            })
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Fingerprint(*hash.as_bytes())
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Fingerprint::from_hex(&value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// Identity of one cached result: function, fingerprint and call arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub function: String,
    pub fingerprint: Fingerprint,
    /// Short hash of the call arguments, `None` for argument-free calls.
    pub args_hash: Option<String>,
}

impl CacheKey {
    pub fn new(function: impl Into<String>, fingerprint: Fingerprint) -> Self {
        CacheKey {
            function: function.into(),
            fingerprint,
            args_hash: None,
        }
    }

    pub fn with_args_hash(mut self, args_hash: Option<String>) -> Self {
        self.args_hash = args_hash;
        self
    }

    /// File name of this entry: `<function>-F<fingerprint>[-<args>].json`.
    pub fn file_name(&self) -> String {
        let mut name = format!(
            "{}-F{}",
            file_stem_prefix(&self.function),
            self.fingerprint.short()
        );
        if let Some(args) = &self.args_hash {
            name.push('-');
            name.push_str(args);
        }
        name.push_str(".json");
        name
    }
}

/// Function name made safe for file names (namespace colons become `_`).
pub(crate) fn file_stem_prefix(function: &str) -> String {
    function
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
        .collect()
}

/// A stored result. The payload is opaque to fpcache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub function: String,
    /// Fingerprint the payload was computed under.
    pub fingerprint: Fingerprint,
    #[serde(default)]
    pub args_hash: Option<String>,
    pub payload: serde_json::Value,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, payload: serde_json::Value) -> Self {
        CacheEntry {
            function: key.function.clone(),
            fingerprint: key.fingerprint,
            args_hash: key.args_hash.clone(),
            payload,
        }
    }

    /// The key this entry was stored under.
    pub fn key(&self) -> CacheKey {
        CacheKey {
            function: self.function.clone(),
            fingerprint: self.fingerprint,
            args_hash: self.args_hash.clone(),
        }
    }
}
