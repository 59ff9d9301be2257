use tracing::trace;

use crate::types::{CuckooError, Result, SlotId};

use super::graph_types::{NodeData, Resident};
use super::{ForwardEdges, MoveGraph, Node};

impl MoveGraph {
    /// Sets the forward-edge list of `slot` to `candidate_edges`.
    ///
    /// On an occupied node the list replaces the alternates of its newest
    /// entry. On an empty node it is reserved and reported by
    /// [`MoveGraph::get_node_data`] until an entry lands. Occupancy is left
    /// untouched.
    pub fn insert_node(
        &mut self,
        slot: SlotId,
        candidate_edges: &[SlotId],
        is_txn: bool,
    ) -> Result<()> {
        let idx = self.check_slot(slot)?;
        self.check_candidates(candidate_edges)?;
        self.touch(idx, is_txn);
        let edges = ForwardEdges::from_slice(candidate_edges);
        let node = &mut self.nodes[idx];
        match node.residents.last_mut() {
            Some(newest) => newest.forward_edges = edges,
            None => node.reserved = Some(edges),
        }
        Ok(())
    }

    /// Returns the node at `slot`, or `None` when it was never inserted.
    pub fn get_node_data(&self, slot: SlotId) -> Option<NodeData<'_>> {
        let node = self.nodes.get(slot.index())?;
        let forward_edges = match node.residents.last() {
            Some(newest) => newest.forward_edges.as_slice(),
            None => node.reserved.as_deref()?,
        };
        Some(NodeData {
            occupancy: node.occupancy,
            occupied: node.occupancy != 0,
            full: node.occupancy == self.full_mask,
            forward_edges,
            residents: &node.residents,
        })
    }

    /// Sets the cached "slot is full" bit of edge `slot`.
    pub fn mark_edge_occupied(&mut self, slot: SlotId, is_txn: bool) -> Result<()> {
        let idx = self.check_slot(slot)?;
        self.touch(idx, is_txn);
        self.edges[idx].occupied = true;
        Ok(())
    }

    /// Clears the cached "slot is full" bit of edge `slot`.
    pub fn mark_edge_free(&mut self, slot: SlotId, is_txn: bool) -> Result<()> {
        let idx = self.check_slot(slot)?;
        self.touch(idx, is_txn);
        self.edges[idx].occupied = false;
        Ok(())
    }

    /// Whether `slot` holds at least one entry.
    pub fn node_is_occupied(&self, slot: SlotId) -> Result<bool> {
        let idx = self.check_slot(slot)?;
        Ok(self.nodes[idx].occupancy != 0)
    }

    /// Whether edge `slot` is cached as full (no entry can land there).
    pub fn edge_is_occupied(&self, slot: SlotId) -> Result<bool> {
        let idx = self.check_slot(slot)?;
        Ok(self.edges[idx].occupied)
    }

    /// Places a brand-new entry at `dst`, recording `candidate_edges` as its
    /// alternates. Fails with `Internal` when `dst` has no free sub-entry.
    pub fn add_entry(
        &mut self,
        dst: SlotId,
        candidate_edges: &[SlotId],
        is_txn: bool,
    ) -> Result<()> {
        let idx = self.check_slot(dst)?;
        self.check_candidates(candidate_edges)?;
        if self.nodes[idx].occupancy == self.full_mask {
            return Err(CuckooError::Internal("placement target is full"));
        }
        self.touch(idx, is_txn);
        land(
            &mut self.nodes[idx],
            ForwardEdges::from_slice(candidate_edges),
        );
        self.occupied_entries += 1;
        self.refresh_edge(idx);
        trace!(slot = dst.0, "cuckoo.node.add");
        Ok(())
    }

    /// Relocates the newest entry of `src` to `dst`.
    pub fn move_node(&mut self, dst: SlotId, src: SlotId, is_txn: bool) -> Result<()> {
        self.check_slot(dst)?;
        let src_idx = self.check_slot(src)?;
        let newest = self.nodes[src_idx]
            .residents
            .len()
            .checked_sub(1)
            .ok_or(CuckooError::Internal("move source holds no entry"))?;
        self.move_resident(dst, src, newest, is_txn)
    }

    /// Relocates entry `resident` (position among `src`'s residents, oldest
    /// first) to `dst`.
    ///
    /// The entry's forward edges travel with it; co-residents left at `src`
    /// keep theirs. It takes the lowest free sub-entry of `dst`.
    pub fn move_resident(
        &mut self,
        dst: SlotId,
        src: SlotId,
        resident: usize,
        is_txn: bool,
    ) -> Result<()> {
        let dst_idx = self.check_slot(dst)?;
        let src_idx = self.check_slot(src)?;
        if dst_idx == src_idx {
            return Err(CuckooError::InvalidArgument("move source equals destination"));
        }
        let held = self.nodes[src_idx].residents.len();
        if held == 0 {
            return Err(CuckooError::Internal("move source holds no entry"));
        }
        if resident >= held {
            return Err(CuckooError::InvalidArgument("resident index out of range"));
        }
        if self.nodes[dst_idx].occupancy == self.full_mask {
            return Err(CuckooError::Internal("move destination is full"));
        }
        self.touch(dst_idx, is_txn);
        self.touch(src_idx, is_txn);

        let carried = leave(&mut self.nodes[src_idx], resident);
        land(&mut self.nodes[dst_idx], carried.forward_edges);

        self.refresh_edge(src_idx);
        self.refresh_edge(dst_idx);
        trace!(dst = dst.0, src = src.0, resident, "cuckoo.node.move");
        Ok(())
    }

    /// Frees the newest entry of `slot`.
    pub fn delete_entry(&mut self, slot: SlotId, is_txn: bool) -> Result<()> {
        let idx = self.check_slot(slot)?;
        let newest = self.nodes[idx]
            .residents
            .len()
            .checked_sub(1)
            .ok_or(CuckooError::InvalidArgument("slot holds no entry"))?;
        self.delete_resident(slot, newest, is_txn)
    }

    /// Frees entry `resident` (position among the residents, oldest first)
    /// of `slot`.
    pub fn delete_resident(&mut self, slot: SlotId, resident: usize, is_txn: bool) -> Result<()> {
        let idx = self.check_slot(slot)?;
        let held = self.nodes[idx].residents.len();
        if held == 0 {
            return Err(CuckooError::InvalidArgument("slot holds no entry"));
        }
        if resident >= held {
            return Err(CuckooError::InvalidArgument("resident index out of range"));
        }
        self.touch(idx, is_txn);
        leave(&mut self.nodes[idx], resident);
        self.occupied_entries -= 1;
        self.refresh_edge(idx);
        trace!(slot = slot.0, resident, "cuckoo.node.delete");
        Ok(())
    }

    /// Releases the forward edges and occupancy of one node without logging.
    pub fn node_cleanup(&mut self, slot: SlotId) -> Result<()> {
        let idx = self.check_slot(slot)?;
        let node = std::mem::take(&mut self.nodes[idx]);
        self.occupied_entries -= u64::from(node.occupancy.count_ones());
        self.refresh_edge(idx);
        Ok(())
    }

    /// Returns every node to the empty state and drops all backups.
    pub fn cleanup(&mut self) {
        for node in &mut self.nodes {
            *node = Node::default();
        }
        for edge in &mut self.edges {
            edge.occupied = false;
        }
        self.occupied_entries = 0;
        self.dirty.clear();
        self.savepoint = None;
        self.queue.reset();
    }

    pub(crate) fn refresh_edge(&mut self, idx: usize) {
        self.edges[idx].occupied = self.nodes[idx].occupancy == self.full_mask;
    }
}

/// Appends an entry with `forward_edges` in the lowest free sub-entry.
fn land(node: &mut Node, forward_edges: ForwardEdges) {
    let bit = lowest_free_bit(node.occupancy);
    node.occupancy |= bit;
    node.residents.push(Resident {
        sub_entry: bit.trailing_zeros(),
        forward_edges,
    });
    node.reserved = None;
}

/// Removes resident `pos`, clearing its sub-entry bit.
fn leave(node: &mut Node, pos: usize) -> Resident {
    let gone = node.residents.remove(pos);
    node.occupancy &= !(1u64 << gone.sub_entry);
    gone
}

fn lowest_free_bit(occupancy: u64) -> u64 {
    !occupancy & occupancy.wrapping_add(1)
}
