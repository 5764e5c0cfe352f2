//! Recoverable issues found while registering functions and building the graph.
//!
//! Diagnostics never abort a session. Each one is logged once at `warn` when
//! it is created and kept so callers can report them afterwards.

use std::fmt;

use serde::Serialize;

/// Why an annotation line was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum AnnotationIssue {
    /// The flag name is neither `monitor` nor `ignore`.
    UnknownFlag { flag: String },
    /// A recognised flag was given no names.
    MissingArguments { flag: String },
}

/// A recoverable condition. The affected annotation or reference is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An annotation line could not be used.
    MalformedAnnotation {
        function: String,
        /// 1-based line within the function source.
        line: usize,
        #[serde(flatten)]
        issue: AnnotationIssue,
    },
    /// A monitored name is not in the registry and cannot be hashed.
    UnresolvedDependency { function: String, reference: String },
}

impl Diagnostic {
    /// Logs this diagnostic at `warn`.
    pub(crate) fn emit(&self) {
        match self {
            Diagnostic::MalformedAnnotation { function, line, .. } => {
                tracing::warn!(function = %function, line, "{}", self);
            }
            Diagnostic::UnresolvedDependency { function, reference } => {
                tracing::warn!(function = %function, reference = %reference, "{}", self);
            }
        }
    }
}

impl fmt::Display for AnnotationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationIssue::UnknownFlag { flag } => write!(f, "unknown flag '{flag}'"),
            AnnotationIssue::MissingArguments { flag } => {
                write!(f, "flag '{flag}' has no arguments")
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedAnnotation {
                function,
                line,
                issue,
            } => write!(f, "ignoring annotation in {function} (line {line}): {issue}"),
            Diagnostic::UnresolvedDependency {
                function,
                reference,
            } => write!(
                f,
                "{function} monitors '{reference}', which is not a registered function; excluded from the fingerprint"
            ),
        }
    }
}
