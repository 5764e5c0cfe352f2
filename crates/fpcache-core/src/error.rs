//! Core error types for fpcache-core.
//!
//! Only conditions that must abort the calling pipeline step are errors.
//! Recoverable issues are reported as [`Diagnostic`](crate::diagnostic::Diagnostic)s.

use thiserror::Error;

/// Fatal errors produced while building or querying a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The name matches no category prefix and was not registered as `other`.
    #[error("unknown category for function '{name}': expected a download, read, correct, convert, calc or tool prefix")]
    UnknownCategory { name: String },

    /// The same name was registered twice in one session.
    #[error("duplicate function name: '{name}'")]
    DuplicateFunction { name: String },

    /// A query referenced a function that is not registered.
    #[error("function not found: '{name}'")]
    FunctionNotFound { name: String },
}
