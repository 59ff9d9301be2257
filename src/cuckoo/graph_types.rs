use crate::types::{EntryHandle, SlotId};

use super::ForwardEdges;

/// Hard ceiling on the number of moves in one eviction chain.
pub const CUCKOO_MAX_NUM_MOVES: usize = 8;
/// Default capacity of the reusable BFS queue.
pub const DEFAULT_BFS_QUEUE_LEN: usize = 4096;
/// Largest supported number of sub-entries packed into one node.
pub const MAX_ENTRIES_PER_NODE: u32 = 64;

/// Read-only view of one node returned by [`super::MoveGraph::get_node_data`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NodeData<'a> {
    /// Sub-entry occupancy bitmap (bit `i` set when sub-entry `i` is in use).
    pub occupancy: u64,
    /// Whether the node holds at least one entry.
    pub occupied: bool,
    /// Whether every sub-entry of the node is in use.
    pub full: bool,
    /// Alternates of the newest entry, or the list reserved on an empty node.
    pub forward_edges: &'a [SlotId],
    /// Entries living in the node, oldest first.
    pub residents: &'a [Resident],
}

impl NodeData<'_> {
    /// Number of forward edges recorded for the node.
    pub fn num_edges(&self) -> u32 {
        self.forward_edges.len() as u32
    }

    /// Number of sub-entries currently in use.
    pub fn used_entries(&self) -> u32 {
        self.occupancy.count_ones()
    }
}

/// One entry living in a node.
///
/// Every resident carries its own alternates, so co-residents of a packed
/// node can be displaced independently.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resident {
    pub(crate) sub_entry: u32,
    pub(crate) forward_edges: ForwardEdges,
}

impl Resident {
    /// Bit of the node's occupancy bitmap held by this entry.
    pub fn sub_entry(&self) -> u32 {
        self.sub_entry
    }

    /// Alternate candidate locations of this entry.
    pub fn forward_edges(&self) -> &[SlotId] {
        &self.forward_edges
    }
}

/// State of the graph-local transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxnState {
    /// No backups held.
    Idle,
    /// At least one node has a pre-transaction backup.
    Dirty,
}

/// Request to place one new entry.
#[derive(Clone, Debug)]
pub struct PlacementRequest<'a, P> {
    /// Hash-computed candidate slots of the new key, in preference order.
    pub candidates: &'a [SlotId],
    /// Caller identifier of the new entry.
    pub handle: EntryHandle,
    /// Opaque match/action payload carried to the hardware-sync collaborator.
    pub payload: P,
}

/// Result of a successful placement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlacementOutcome {
    /// Slot where the new entry landed.
    pub slot: SlotId,
    /// Number of moves executed, including the final placement.
    pub moves: usize,
    /// Queue positions explored by the search.
    pub explored: usize,
}

impl PlacementOutcome {
    /// Number of pre-existing entries relocated to make room.
    pub fn relocations(&self) -> usize {
        self.moves.saturating_sub(1)
    }
}
