//! Cuckoo placement engine for hash-way exact-match tables.
//!
//! A [`MoveGraph`] tracks which slots of one (table, pipe, stage) are in use and,
//! for every occupied slot, the alternate locations its entry could be moved to.
//! Placing a key whose candidate slots are all full runs a breadth-first search
//! for the shortest eviction chain ending at a free slot, turns the chain into a
//! [`MoveList`], and executes it hop by hop against a [`SlotSync`] collaborator.
//! Every occupancy mutation can be logged in a graph-local transaction that the
//! caller commits or aborts at its own batch boundary.
//!
//! The graph performs no locking. Callers serialize all access to one instance.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::types::{CuckooError, Result, SlotId};

mod bfs_ops;
mod executor;
mod graph_types;
mod memory;
mod metrics;
mod move_list;
mod node_ops;
mod options;
mod placer;
mod txn_ops;

pub use bfs_ops::{BfsHit, BfsQueueNode};
pub use executor::{MoveExecutor, SlotSync};
pub use graph_types::{
    NodeData, PlacementOutcome, PlacementRequest, Resident, TxnState, CUCKOO_MAX_NUM_MOVES,
    DEFAULT_BFS_QUEUE_LEN, MAX_ENTRIES_PER_NODE,
};
pub use memory::{InjectedFault, MemorySlots, SyncOp};
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, PlacementMetrics};
pub use move_list::{MoveList, MoveListBuilder, MoveListEntry, OccupantResolver};
pub use options::{ConfigError, CuckooConfig, CuckooOptions};

use bfs_ops::BfsQueue;
use txn_ops::Savepoint;

pub(crate) type ForwardEdges = SmallVec<[SlotId; 8]>;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Node {
    occupancy: u64,
    /// Entries living in the node, oldest first.
    residents: SmallVec<[Resident; 1]>,
    /// Alternates recorded by `insert_node` while the node is empty.
    reserved: Option<ForwardEdges>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Edge {
    occupied: bool,
}

/// Pre-mutation copy of one node and its edge-cache bit.
#[derive(Clone, Debug)]
pub(crate) struct NodeBackup {
    node: Node,
    edge: Edge,
}

/// Comparable copy of every node and edge of a graph.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GraphSnapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Number of slots captured.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot holds no slots.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Occupancy bitmap of `slot` at capture time.
    pub fn occupancy(&self, slot: SlotId) -> Option<u64> {
        self.nodes.get(slot.index()).map(|node| node.occupancy)
    }
}

/// Occupancy graph of one (table, pipe, stage) context.
pub struct MoveGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    entries_per_node: u32,
    full_mask: u64,
    max_moves: usize,
    occupied_entries: u64,
    queue: BfsQueue,
    dirty: FxHashMap<u32, NodeBackup>,
    savepoint: Option<Savepoint>,
    metrics: Arc<dyn PlacementMetrics>,
}

impl MoveGraph {
    /// Creates an empty graph with `num_slots` slots.
    pub fn new(num_slots: u32, opts: &CuckooOptions) -> Result<Self> {
        if num_slots == 0 {
            return Err(CuckooError::InvalidArgument("graph needs at least one slot"));
        }
        opts.validate()?;
        let len = num_slots as usize;
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(len)
            .map_err(|_| CuckooError::ResourceExhausted("node array allocation failed"))?;
        nodes.resize_with(len, Node::default);
        let mut edges = Vec::new();
        edges
            .try_reserve_exact(len)
            .map_err(|_| CuckooError::ResourceExhausted("edge array allocation failed"))?;
        edges.resize(len, Edge::default());
        let queue = BfsQueue::with_capacity(opts.bfs_queue_len, len)?;
        let full_mask = if opts.entries_per_node == MAX_ENTRIES_PER_NODE {
            u64::MAX
        } else {
            (1u64 << opts.entries_per_node) - 1
        };
        Ok(Self {
            nodes,
            edges,
            entries_per_node: opts.entries_per_node,
            full_mask,
            max_moves: opts.max_moves,
            occupied_entries: 0,
            queue,
            dirty: FxHashMap::default(),
            savepoint: None,
            metrics: opts.metrics.clone().unwrap_or_else(default_metrics),
        })
    }

    /// Number of slots tracked by the graph.
    pub fn num_slots(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Number of sub-entries packed into every node.
    pub fn entries_per_node(&self) -> u32 {
        self.entries_per_node
    }

    /// Longest move chain a search may return.
    pub fn max_moves(&self) -> usize {
        self.max_moves
    }

    /// Total number of sub-entries currently in use.
    pub fn occupied_entries(&self) -> u64 {
        self.occupied_entries
    }

    /// Number of nodes holding at least one entry.
    pub fn occupied_nodes(&self) -> usize {
        self.nodes.iter().filter(|node| node.occupancy != 0).count()
    }

    /// Captures the current node and edge state.
    pub fn occupancy_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub(crate) fn metrics(&self) -> &Arc<dyn PlacementMetrics> {
        &self.metrics
    }

    fn check_slot(&self, slot: SlotId) -> Result<usize> {
        let idx = slot.index();
        if idx >= self.nodes.len() {
            tracing::warn!(slot = slot.0, slots = self.nodes.len(), "cuckoo.slot.out_of_range");
            return Err(CuckooError::InvalidArgument("slot index out of range"));
        }
        Ok(idx)
    }

    fn check_candidates(&self, candidates: &[SlotId]) -> Result<()> {
        if candidates.len() > u32::MAX as usize {
            return Err(CuckooError::InvalidArgument("candidate set too large"));
        }
        for slot in candidates {
            self.check_slot(*slot)?;
        }
        Ok(())
    }
}
