//! Control annotations embedded in function sources.
//!
//! An annotation is a line holding nothing but a string literal whose text
//! starts with `!#`:
//!
//! ```text
//! "!# @monitor pkg:::toolHelper readExtra"
//! "!# @ignore toolPlot"
//! ```
//!
//! `monitor` adds names to the dependency set and propagates to every caller.
//! `ignore` removes names from the declaring function's own set only.
//! Lines accumulate; problems are reported as diagnostics and skipped.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diagnostic::{AnnotationIssue, Diagnostic};

/// A standalone single- or double-quoted literal, optionally followed by `;`.
static LITERAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:"([^"]*)"|'([^']*)')\s*;?\s*$"#).expect("annotation pattern is valid")
});

const MARKER: &str = "!#";

/// Monitor and ignore sets declared by one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags {
    /// Names forced into the dependency set of this function and its callers.
    pub monitor: BTreeSet<String>,
    /// Names removed from this function's own effective dependency set.
    pub ignore: BTreeSet<String>,
}

impl ControlFlags {
    /// Extracts the flags declared in `source`.
    ///
    /// `function` only labels the returned diagnostics. Every diagnostic is
    /// also logged at `warn`.
    pub fn parse(function: &str, source: &str) -> (ControlFlags, Vec<Diagnostic>) {
        let mut flags = ControlFlags::default();
        let mut diagnostics = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let Some(body) = annotation_body(line) else {
                continue;
            };

            let mut tokens = body.split_whitespace();
            let flag = tokens.next().unwrap_or_default();
            let names: Vec<&str> = tokens.collect();

            let target = match flag.strip_prefix('@').unwrap_or(flag) {
                "monitor" => &mut flags.monitor,
                "ignore" => &mut flags.ignore,
                other => {
                    let diag = Diagnostic::MalformedAnnotation {
                        function: function.to_string(),
                        line: index + 1,
                        issue: AnnotationIssue::UnknownFlag {
                            flag: other.to_string(),
                        },
                    };
                    diag.emit();
                    diagnostics.push(diag);
                    continue;
                }
            };

            if names.is_empty() {
                let diag = Diagnostic::MalformedAnnotation {
                    function: function.to_string(),
                    line: index + 1,
                    issue: AnnotationIssue::MissingArguments {
                        flag: flag.trim_start_matches('@').to_string(),
                    },
                };
                diag.emit();
                diagnostics.push(diag);
                continue;
            }

            target.extend(names.into_iter().map(str::to_string));
        }

        (flags, diagnostics)
    }

    /// Returns `true` if no names are monitored or ignored.
    pub fn is_empty(&self) -> bool {
        self.monitor.is_empty() && self.ignore.is_empty()
    }
}

/// Whether `line` is an annotation literal, well-formed or not.
pub(crate) fn is_annotation(line: &str) -> bool {
    annotation_body(line).is_some()
}

/// Returns the text after `!#` if `line` is an annotation literal.
fn annotation_body(line: &str) -> Option<&str> {
    let captures = LITERAL_LINE.captures(line)?;
    let literal = captures.get(1).or_else(|| captures.get(2))?.as_str();
    literal.trim_start().strip_prefix(MARKER).map(str::trim)
}
