use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CuckooError, Result};

use super::graph_types::{CUCKOO_MAX_NUM_MOVES, DEFAULT_BFS_QUEUE_LEN, MAX_ENTRIES_PER_NODE};
use super::metrics::PlacementMetrics;

/// Configuration options supplied when creating a [`super::MoveGraph`].
#[derive(Clone)]
pub struct CuckooOptions {
    /// Sub-entries packed into every node (wide-word packing).
    pub entries_per_node: u32,
    /// Capacity of the reusable BFS queue.
    pub bfs_queue_len: usize,
    /// Longest chain a search may return, at most [`CUCKOO_MAX_NUM_MOVES`].
    pub max_moves: usize,
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn PlacementMetrics>>,
}

impl CuckooOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            entries_per_node: 1,
            bfs_queue_len: DEFAULT_BFS_QUEUE_LEN,
            max_moves: CUCKOO_MAX_NUM_MOVES,
            metrics: None,
        }
    }

    /// Builds options from a parsed configuration file.
    pub fn from_config(cfg: &CuckooConfig) -> Self {
        Self {
            entries_per_node: cfg.entries_per_node,
            bfs_queue_len: cfg.bfs_queue_len,
            max_moves: cfg.max_moves,
            metrics: None,
        }
    }

    /// Sets the number of sub-entries per node.
    pub fn entries_per_node(mut self, entries: u32) -> Self {
        self.entries_per_node = entries;
        self
    }

    /// Sets the BFS queue capacity.
    pub fn bfs_queue_len(mut self, len: usize) -> Self {
        self.bfs_queue_len = len;
        self
    }

    /// Sets the move ceiling.
    pub fn max_moves(mut self, moves: usize) -> Self {
        self.max_moves = moves;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn PlacementMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.entries_per_node == 0 || self.entries_per_node > MAX_ENTRIES_PER_NODE {
            return Err(CuckooError::InvalidArgument("entries_per_node must be in 1..=64"));
        }
        if self.bfs_queue_len == 0 {
            return Err(CuckooError::InvalidArgument("bfs_queue_len must be positive"));
        }
        if self.max_moves == 0 || self.max_moves > CUCKOO_MAX_NUM_MOVES {
            return Err(CuckooError::InvalidArgument("max_moves must be in 1..=8"));
        }
        Ok(())
    }
}

impl Default for CuckooOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// File form of the numeric [`CuckooOptions`].
///
/// ```toml
/// entries_per_node = 4
/// bfs_queue_len = 2048
/// max_moves = 6
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CuckooConfig {
    /// Sub-entries per node.
    pub entries_per_node: u32,
    /// BFS queue capacity.
    pub bfs_queue_len: usize,
    /// Move ceiling.
    pub max_moves: usize,
}

impl Default for CuckooConfig {
    fn default() -> Self {
        Self {
            entries_per_node: 1,
            bfs_queue_len: DEFAULT_BFS_QUEUE_LEN,
            max_moves: CUCKOO_MAX_NUM_MOVES,
        }
    }
}

impl CuckooConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, ConfigError> {
        let cfg: CuckooConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse { source })?;
        CuckooOptions::from_config(&cfg)
            .validate()
            .map_err(|source| ConfigError::Invalid { source })?;
        Ok(cfg)
    }

    /// Reads, parses and validates the TOML file at `path`.
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> std::result::Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }
}

/// Errors raised while loading a [`CuckooConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read cuckoo config {path}: {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The document is not valid TOML for this schema.
    #[error("failed to parse cuckoo config: {source}")]
    Parse {
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// The configuration could not be serialized.
    #[error("failed to serialize cuckoo config: {source}")]
    Serialize {
        /// Underlying TOML error.
        source: toml::ser::Error,
    },
    /// A value is out of range.
    #[error("invalid cuckoo config: {source}")]
    Invalid {
        /// Validation failure.
        source: CuckooError,
    },
}
