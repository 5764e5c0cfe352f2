//! Cache sessions against a cache folder on disk.
//!
//! Each test simulates several pipeline runs: a session is built from the
//! current sources, a result is looked up and, on a miss, written back.

use std::path::Path;

use fpcache::{CacheConfig, CacheDecision, CacheKind, CacheSession, LookupRequest};
use fpcache_core::{Depth, FunctionSource};
use fpcache_storage::CacheStore;
use serde_json::json;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn shared_config(folder: &Path) -> CacheConfig {
    CacheConfig {
        cache_folder: Some(folder.to_path_buf()),
        ..CacheConfig::default()
    }
}

fn sources(read_data: &str, read_data2: &str) -> Vec<FunctionSource> {
    vec![
        FunctionSource::new("readData", read_data.to_string()),
        FunctionSource::new("readData2", read_data2.to_string()),
        FunctionSource::new("calcExample", "function() { readData() }"),
        FunctionSource::new("calcExample2", "function() { readData(); readData2() }"),
    ]
}

/// Runs `function` once: returns the decision and writes on a miss.
fn run(session: &CacheSession, function: &str, payload: serde_json::Value) -> CacheDecision {
    let mut store = session.open_store().unwrap();
    let request = LookupRequest::new(function);
    let lookup = session.lookup(&store, &request).unwrap();
    if lookup.entry.is_none() {
        session.store_result(&mut store, &request, payload).unwrap();
    }
    lookup.decision
}

// ---------------------------------------------------------------------------
// Shared cache
// ---------------------------------------------------------------------------

#[test]
fn shared_cache_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(dir.path());

    let first = CacheSession::new(sources("x <- 1", "y <- 2"), config.clone()).unwrap();
    assert_eq!(run(&first, "calcExample", json!(1)), CacheDecision::Miss);
    assert_eq!(run(&first, "calcExample2", json!(2)), CacheDecision::Miss);

    // Same sources in a new session: both hit.
    let second = CacheSession::new(sources("x <- 1", "y <- 2"), config.clone()).unwrap();
    assert_eq!(run(&second, "calcExample", json!(1)), CacheDecision::Hit);
    assert_eq!(run(&second, "calcExample2", json!(2)), CacheDecision::Hit);

    // Editing readData2 only invalidates calcExample2.
    let third = CacheSession::new(sources("x <- 1", "y <- 3"), config).unwrap();
    assert_eq!(run(&third, "calcExample", json!(1)), CacheDecision::Hit);
    assert_eq!(run(&third, "calcExample2", json!(2)), CacheDecision::Miss);
}

#[test]
fn forced_read_of_stale_file() {
    let dir = tempfile::tempdir().unwrap();
    let old = CacheSession::new(sources("x <- 1", "y <- 2"), shared_config(dir.path())).unwrap();
    run(&old, "calcExample", json!("computed under old sources"));

    let forced = CacheSession::new(
        sources("x <- 99", "y <- 2"),
        CacheConfig {
            force_cache: true,
            ..shared_config(dir.path())
        },
    )
    .unwrap();
    let store = forced.open_store().unwrap();
    let lookup = forced.lookup(&store, &LookupRequest::new("calcExample")).unwrap();
    assert_eq!(lookup.decision, CacheDecision::ForcedHit);
    assert_eq!(lookup.entry.unwrap().payload, json!("computed under old sources"));
    // The current key still points at where a fresh result would go.
    assert!(store.get(&lookup.key).unwrap().is_none());
}

#[test]
fn corrupt_cache_file_is_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    let session = CacheSession::new(sources("x <- 1", "y <- 2"), shared_config(dir.path())).unwrap();
    run(&session, "calcExample", json!(1));

    let store = session.open_store().unwrap();
    let key = session.key(&LookupRequest::new("calcExample")).unwrap();
    std::fs::write(store.entry_path(&key), "{truncated").unwrap();

    assert_eq!(run(&session, "calcExample", json!(2)), CacheDecision::Miss);
    assert_eq!(run(&session, "calcExample", json!(2)), CacheDecision::Hit);
}

// ---------------------------------------------------------------------------
// Revision-scoped cache
// ---------------------------------------------------------------------------

#[test]
fn revision_scoped_reuses_within_revision_only() {
    let dir = tempfile::tempdir().unwrap();
    let rev = |revision: &str| CacheConfig {
        cache_folder: Some(dir.path().to_path_buf()),
        cache_type: CacheKind::RevisionScoped,
        revision: Some(revision.to_string()),
        ..CacheConfig::default()
    };

    let first = CacheSession::new(sources("x <- 1", "y <- 2"), rev("1")).unwrap();
    assert_eq!(run(&first, "calcExample", json!("rev1")), CacheDecision::Miss);
    assert!(dir.path().join("rev1").is_dir());

    // Within the revision a source edit still reuses the entry.
    let edited = CacheSession::new(sources("x <- 5", "y <- 2"), rev("1")).unwrap();
    assert_eq!(run(&edited, "calcExample", json!("unused")), CacheDecision::ForcedHit);

    // A new revision starts empty.
    let next = CacheSession::new(sources("x <- 5", "y <- 2"), rev("2")).unwrap();
    assert_eq!(run(&next, "calcExample", json!("rev2")), CacheDecision::Miss);
}

// ---------------------------------------------------------------------------
// Annotations and source folders
// ---------------------------------------------------------------------------

#[test]
fn monitored_helper_invalidates_cache() {
    let dir = tempfile::tempdir().unwrap();
    let build = |helper: &str| {
        CacheSession::new(
            vec![
                FunctionSource::new("toolRegionMapping", helper.to_string()),
                FunctionSource::new(
                    "calcExample",
                    "function() {\n  \"!# @monitor toolRegionMapping\"\n  1\n}",
                ),
            ],
            shared_config(dir.path()),
        )
        .unwrap()
    };

    let first = build("mapping v1");
    assert_eq!(
        first
            .dependencies("calcExample", Depth::Direct)
            .unwrap()
            .into_iter()
            .map(|info| info.name)
            .collect::<Vec<_>>(),
        vec!["toolRegionMapping"]
    );
    assert_eq!(run(&first, "calcExample", json!(1)), CacheDecision::Miss);
    assert_eq!(run(&build("mapping v1"), "calcExample", json!(1)), CacheDecision::Hit);
    assert_eq!(run(&build("mapping v2"), "calcExample", json!(1)), CacheDecision::Miss);
}

#[test]
fn source_folder_change_invalidates_reader() {
    let cache = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    std::fs::write(data.path().join("input.csv"), "region,value\nEUR,1\n").unwrap();

    let build = || {
        CacheSession::new(
            vec![
                FunctionSource::new("readData", "read.csv('input.csv')").with_source_folder(data.path()),
                FunctionSource::new("calcExample", "readData()"),
            ],
            shared_config(cache.path()),
        )
        .unwrap()
    };

    assert_eq!(run(&build(), "calcExample", json!(1)), CacheDecision::Miss);
    assert_eq!(run(&build(), "calcExample", json!(1)), CacheDecision::Hit);

    std::fs::write(data.path().join("input.csv"), "region,value\nEUR,2\n").unwrap();
    assert_eq!(run(&build(), "calcExample", json!(1)), CacheDecision::Miss);
}

#[test]
fn malformed_annotations_are_diagnostics() {
    let session = CacheSession::new(
        vec![FunctionSource::new(
            "calcExample",
            "\"!# @watch readData\"\n\"!# @monitor\"\n1",
        )],
        CacheConfig::default(),
    )
    .unwrap();
    assert_eq!(session.diagnostics().len(), 2);
    assert!(session.fingerprint("calcExample").is_ok());
}
