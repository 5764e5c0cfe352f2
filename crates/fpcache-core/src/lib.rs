//! Data model for fingerprint-based cache invalidation of pipeline functions.
//!
//! - [`registry`]: classification, hashing and lookup of function sources
//! - [`flags`]: `monitor` / `ignore` annotations embedded in sources
//! - [`scan`]: static call-target scanning
//! - [`graph`]: the dependency graph built from a registry
//! - [`diagnostic`]: recoverable issues found while building the graph

pub mod category;
pub mod diagnostic;
pub mod error;
pub mod flags;
pub mod function;
pub mod graph;
pub mod id;
pub mod registry;
pub mod scan;

// Re-export commonly used types
pub use category::Category;
pub use diagnostic::{AnnotationIssue, Diagnostic};
pub use error::CoreError;
pub use flags::ControlFlags;
pub use function::{base_name, FunctionDescriptor, FunctionSource, SourceLocation};
pub use graph::{DependencyGraph, DependencyInfo, DependencyKind, Depth};
pub use id::FunctionId;
pub use registry::{Registry, RegistryBuilder};
