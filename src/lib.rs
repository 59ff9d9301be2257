//! Cuckoo entry placement for hash-way exact-match tables.
//!
//! The [`cuckoo`] module holds the occupancy graph, the bounded breadth-first
//! eviction search, move-list construction and execution, and the graph-local
//! transaction log. [`types`] holds identifiers and the error type.

#![warn(missing_docs)]

pub mod cuckoo;
pub mod types;

pub use cuckoo::{
    CuckooOptions, MoveExecutor, MoveGraph, MoveList, MoveListBuilder, MoveListEntry,
    PlacementOutcome, PlacementRequest, SlotSync, CUCKOO_MAX_NUM_MOVES,
};
pub use types::{CuckooError, EntryHandle, Result, SlotId};
