//! Function sources and the descriptors built from them.
//!
//! [`FunctionSource`] is the raw input handed to the registry.
//! [`FunctionDescriptor`] is the immutable, classified and hashed form that
//! the graph and fingerprint engine work with.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::flags::ControlFlags;
use crate::id::FunctionId;

/// Where a function is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-based line of the definition.
    pub line: u32,
}

/// A named function source awaiting registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSource {
    /// Registered name, optionally qualified as `namespace:::identifier`.
    pub name: String,
    /// Full source text, annotations included.
    pub text: String,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    /// Folder of raw input data backing this function, hashed into its
    /// fingerprint when present.
    #[serde(default)]
    pub source_folder: Option<PathBuf>,
    /// Registers the function as [`Category::Other`] regardless of its name.
    #[serde(default)]
    pub other: bool,
}

impl FunctionSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        FunctionSource {
            name: name.into(),
            text: text.into(),
            location: None,
            source_folder: None,
            other: false,
        }
    }

    /// Records the definition site.
    pub fn at(mut self, file: impl Into<PathBuf>, line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }

    /// Associates a raw-data folder with this function.
    pub fn with_source_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.source_folder = Some(folder.into());
        self
    }

    /// Marks the function as `other`: never scanned for, only monitored.
    pub fn as_other(mut self) -> Self {
        self.other = true;
        self
    }
}

/// A registered pipeline function.
///
/// Built once per session by the [`Registry`](crate::registry::Registry) and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub id: FunctionId,
    pub name: String,
    pub category: Category,
    /// blake3 of [`source`](Self::source). Pure content addressing.
    pub source_hash: blake3::Hash,
    pub source: String,
    pub location: Option<SourceLocation>,
    pub source_folder: Option<PathBuf>,
    /// Annotations declared in the source.
    pub flags: ControlFlags,
}

impl FunctionDescriptor {
    /// The unqualified identifier of this function.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    /// Names monitored by this function.
    pub fn monitor_deps(&self) -> impl Iterator<Item = &str> {
        self.flags.monitor.iter().map(String::as_str)
    }

    /// Names ignored by this function.
    pub fn ignore_deps(&self) -> impl Iterator<Item = &str> {
        self.flags.ignore.iter().map(String::as_str)
    }
}

/// Strips a `namespace:::` or `namespace::` qualifier from a reference.
pub fn base_name(reference: &str) -> &str {
    reference
        .rsplit_once("::")
        .map_or(reference, |(_, identifier)| identifier.trim_start_matches(':'))
}
