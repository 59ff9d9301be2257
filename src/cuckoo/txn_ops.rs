use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use super::graph_types::TxnState;
use super::{MoveGraph, NodeBackup};

/// Placement-scoped undo log opened by the move executor.
///
/// Records the first pre-mutation image of every node touched while it is
/// open, plus the dirty-log keys it created, so a failed placement can be
/// undone without disturbing the enclosing batch transaction.
#[derive(Debug, Default)]
pub(crate) struct Savepoint {
    images: FxHashMap<u32, NodeBackup>,
    created_dirty: SmallVec<[u32; 16]>,
}

impl MoveGraph {
    /// Current state of the graph-local transaction.
    pub fn txn_state(&self) -> TxnState {
        if self.dirty.is_empty() {
            TxnState::Idle
        } else {
            TxnState::Dirty
        }
    }

    /// Number of nodes holding a pre-transaction backup.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Keeps the current state and drops every backup.
    pub fn txn_commit(&mut self) {
        debug!(dirty = self.dirty.len(), "cuckoo.txn.commit");
        self.dirty.clear();
    }

    /// Restores every dirtied node to its pre-transaction image.
    pub fn txn_abort(&mut self) {
        debug!(dirty = self.dirty.len(), "cuckoo.txn.abort");
        let dirty = std::mem::take(&mut self.dirty);
        for (idx, backup) in dirty {
            self.restore(idx as usize, backup);
        }
        self.debug_check_occupancy();
    }

    /// Captures the pre-mutation image of node `idx` where needed.
    ///
    /// The transaction log keeps the first image it sees, so repeated
    /// mutations of one node inside a transaction preserve the true
    /// pre-transaction state.
    pub(crate) fn touch(&mut self, idx: usize, is_txn: bool) {
        let key = idx as u32;
        let mut newly_dirty = false;
        if is_txn && !self.dirty.contains_key(&key) {
            let backup = self.backup_of(idx);
            self.dirty.insert(key, backup);
            newly_dirty = true;
        }
        let needs_image = matches!(&self.savepoint, Some(sp) if !sp.images.contains_key(&key));
        let backup = needs_image.then(|| self.backup_of(idx));
        if let Some(sp) = self.savepoint.as_mut() {
            if let Some(backup) = backup {
                sp.images.insert(key, backup);
            }
            if newly_dirty {
                sp.created_dirty.push(key);
            }
        }
    }

    pub(crate) fn savepoint_begin(&mut self) {
        debug_assert!(self.savepoint.is_none(), "savepoints do not nest");
        self.savepoint = Some(Savepoint::default());
    }

    pub(crate) fn savepoint_release(&mut self) {
        self.savepoint = None;
    }

    pub(crate) fn savepoint_rollback(&mut self) {
        let Some(sp) = self.savepoint.take() else {
            return;
        };
        for key in &sp.created_dirty {
            self.dirty.remove(key);
        }
        for (idx, backup) in sp.images {
            self.restore(idx as usize, backup);
        }
        self.debug_check_occupancy();
    }

    fn backup_of(&self, idx: usize) -> NodeBackup {
        NodeBackup {
            node: self.nodes[idx].clone(),
            edge: self.edges[idx],
        }
    }

    fn restore(&mut self, idx: usize, backup: NodeBackup) {
        let live = u64::from(self.nodes[idx].occupancy.count_ones());
        let restored = u64::from(backup.node.occupancy.count_ones());
        self.occupied_entries = self.occupied_entries - live + restored;
        self.nodes[idx] = backup.node;
        self.edges[idx] = backup.edge;
    }

    fn debug_check_occupancy(&self) {
        debug_assert_eq!(
            self.occupied_entries,
            self.nodes
                .iter()
                .map(|node| u64::from(node.occupancy.count_ones()))
                .sum::<u64>()
        );
    }
}
