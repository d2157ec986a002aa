//! Literal end-to-end scenarios against the public API, complementing the
//! per-module unit tests. `W_max = 512`, `S = 1000` throughout.

use pretty_assertions::assert_eq;
use scrollback_index::{Indexer, IndexerConfig};
use tempdir::TempDir;

mod common;

fn open(log_path: &std::path::Path, cache_root: &std::path::Path) -> Indexer {
    let config = IndexerConfig::builder().cache_root(cache_root).build();
    Indexer::open(log_path, config).unwrap()
}

#[test]
fn s2_mixed_width_wrapping() {
    common::init_tracing();
    let dir = TempDir::new("scenarios").unwrap();
    let log_path = dir.path().join("app.log");
    let content = format!("{}\n{}\n{}\n", "x".repeat(40), "y".repeat(120), "z".repeat(200));
    std::fs::write(&log_path, content).unwrap();

    let indexer = open(&log_path, &dir.path().join("cache"));
    assert_eq!(indexer.len(), 3);

    let view = indexer.width(80).unwrap();
    assert_eq!(view.len(), 1 + 2 + 3);
    assert_eq!(view.get(0).unwrap(), "x".repeat(40));
    assert_eq!(view.get(1).unwrap(), "y".repeat(80));
    assert_eq!(view.get(2).unwrap(), "y".repeat(40));
    assert_eq!(view.get(3).unwrap(), "z".repeat(80));
    assert_eq!(view.get(4).unwrap(), "z".repeat(80));
    assert_eq!(view.get(5).unwrap(), "z".repeat(40));
}

#[test]
fn s3_custom_width_function() {
    common::init_tracing();
    let dir = TempDir::new("scenarios").unwrap();
    let log_path = dir.path().join("app.log");
    std::fs::write(&log_path, "abc\ndefgh\n").unwrap();

    let config = IndexerConfig::builder()
        .cache_root(dir.path().join("cache"))
        .width_fn(|line| line.chars().count() as u32)
        .build();
    let indexer = Indexer::open(&log_path, config).unwrap();

    let view = indexer.width(3).unwrap();
    assert_eq!(view.len(), 1 + 2);
    assert_eq!(view.get(0).unwrap(), "abc");
    assert_eq!(view.get(1).unwrap(), "def");
    assert_eq!(view.get(2).unwrap(), "gh");
}
