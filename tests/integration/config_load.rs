#![allow(missing_docs)]

use std::fs;

use exm_cuckoo::cuckoo::{ConfigError, CuckooConfig, CuckooOptions, MoveGraph};
use exm_cuckoo::types::{CuckooError, Result};
use tempfile::tempdir;

#[test]
fn empty_document_uses_defaults() {
    let cfg = CuckooConfig::from_toml_str("").expect("defaults");
    assert_eq!(cfg, CuckooConfig::default());
    assert_eq!(cfg.max_moves, 8);
    assert_eq!(cfg.entries_per_node, 1);
}

#[test]
fn file_values_reach_the_graph() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cuckoo.toml");
    fs::write(&path, "entries_per_node = 4\nbfs_queue_len = 64\nmax_moves = 3\n")
        .expect("write config");

    let cfg = CuckooConfig::load(&path).expect("load");
    let graph = MoveGraph::new(16, &CuckooOptions::from_config(&cfg))?;
    assert_eq!(graph.entries_per_node(), 4);
    assert_eq!(graph.max_moves(), 3);
    Ok(())
}

#[test]
fn out_of_range_values_are_rejected() {
    let err = CuckooConfig::from_toml_str("max_moves = 12").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            source: CuckooError::InvalidArgument(_)
        }
    ));
    assert!(CuckooConfig::from_toml_str("entries_per_node = 0").is_err());
}

#[test]
fn unknown_keys_and_missing_files_fail() {
    assert!(matches!(
        CuckooConfig::from_toml_str("queue = 3"),
        Err(ConfigError::Parse { .. })
    ));
    let dir = tempdir().expect("tempdir");
    assert!(matches!(
        CuckooConfig::load(&dir.path().join("absent.toml")),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
fn config_round_trips_through_toml() {
    let cfg = CuckooConfig {
        entries_per_node: 2,
        bfs_queue_len: 128,
        max_moves: 5,
    };
    let text = cfg.to_toml_string().expect("serialize");
    assert_eq!(CuckooConfig::from_toml_str(&text).expect("parse"), cfg);
}
