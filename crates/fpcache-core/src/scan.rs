//! Static dependency scanning.
//!
//! The scan is textual and conservative. Every `name(` in the source counts
//! as a call, and every bare `name` counts as a reference, since a function
//! passed as a value (`lapply(x, toolFix)`) is reachable too. Dead branches,
//! comments and strings are included. An extra edge only causes an
//! unnecessary recomputation; a missing edge would serve stale data.
//!
//! Annotation lines are skipped: naming a function in `ignore` or `monitor`
//! must not turn it into a scanned dependency.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::flags::is_annotation;

/// `identifier(` with an optional `namespace::` or `namespace:::` qualifier.
static CALL_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b([A-Za-z][A-Za-z0-9._]*)\s*:::?\s*)?\b([A-Za-z_.][A-Za-z0-9._]*)\s*\(")
        .expect("call pattern is valid")
});

/// Any identifier, optionally qualified.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b([A-Za-z][A-Za-z0-9._]*)\s*:::?\s*)?\b([A-Za-z_.][A-Za-z0-9._]*)")
        .expect("identifier pattern is valid")
});

/// Returns every syntactic call target in `source`, qualified as
/// `namespace:::identifier` when written with a namespace.
pub fn call_targets(source: &str) -> BTreeSet<String> {
    collect(&CALL_EXPR, source)
}

/// Returns every identifier in `source`, called or not, qualified like
/// [`call_targets`]. A superset of the call targets.
pub fn references(source: &str) -> BTreeSet<String> {
    collect(&IDENTIFIER, source)
}

fn collect(pattern: &Regex, source: &str) -> BTreeSet<String> {
    source
        .lines()
        .filter(|line| !is_annotation(line))
        .flat_map(|line| pattern.captures_iter(line))
        .filter_map(|captures| {
            let identifier = captures.get(2)?.as_str();
            Some(match captures.get(1) {
                Some(namespace) => format!("{}:::{}", namespace.as_str(), identifier),
                None => identifier.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(source: &str) -> Vec<String> {
        call_targets(source).into_iter().collect()
    }

    #[test]
    fn finds_plain_calls() {
        assert_eq!(
            targets("x <- readData(); y <- toolAggregate (x, 2)"),
            vec!["readData", "toolAggregate"]
        );
    }

    #[test]
    fn keeps_namespace_qualifiers() {
        assert_eq!(
            targets("a <- pkg::readData()\nb <- other:::toolFix(a)"),
            vec!["other:::toolFix", "pkg:::readData"]
        );
    }

    #[test]
    fn functions_passed_as_values_are_references() {
        let source = "out <- lapply(1:3, toolFix)\ndo.call(pkg::readData, list())";
        assert_eq!(targets(source), vec!["do.call", "lapply", "list"]);

        let refs: Vec<String> = references(source).into_iter().collect();
        assert!(refs.contains(&"toolFix".to_string()));
        assert!(refs.contains(&"pkg:::readData".to_string()));
        assert!(refs.contains(&"lapply".to_string()));
    }

    #[test]
    fn annotation_lines_are_not_scanned() {
        let source = "\"!# @monitor readData\"\n  '!# @ignore toolFix(x)'\nx <- 1";
        assert!(targets(source).is_empty());
        assert_eq!(references(source).into_iter().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn calls_in_dead_branches_are_included() {
        let source = "if (FALSE) {\n  readData2()\n}\n# calcOld()\n";
        assert_eq!(targets(source), vec!["calcOld", "if", "readData2"]);
    }
}
