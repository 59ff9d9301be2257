use smallvec::SmallVec;
use tracing::warn;

use crate::types::{CuckooError, EntryHandle, Result, SlotId};

use super::bfs_ops::{BfsHit, BfsQueueNode};
use super::graph_types::CUCKOO_MAX_NUM_MOVES;
use super::{ForwardEdges, MoveGraph};

/// One planned single-slot relocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MoveListEntry<P> {
    /// Slot being vacated; `None` for the placement of the new entry.
    pub src: Option<SlotId>,
    /// Position of the carried entry among `src`'s residents, oldest first.
    /// Zero for the placement.
    pub src_resident: usize,
    /// Slot receiving the entry.
    pub dst: SlotId,
    /// Caller identifier of the entry being carried.
    pub entry_handle: EntryHandle,
    /// Opaque payload of the entry being carried.
    pub payload: P,
}

impl<P> MoveListEntry<P> {
    /// Whether this hop places the brand-new entry.
    pub fn is_placement(&self) -> bool {
        self.src.is_none()
    }
}

/// Ordered hops of one eviction chain, stored in execution order.
///
/// The first hop moves the occupant at the end of the chain into the free
/// slot the search found; every following hop fills the slot the previous
/// hop vacated; the last hop places the new entry. Executing the hops in
/// this order means every destination is free when it is written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MoveList<P> {
    moves: Vec<MoveListEntry<P>>,
    new_entry_edges: ForwardEdges,
}

impl<P> MoveList<P> {
    /// Number of hops, including the final placement.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Whether the list holds no hops.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Hops in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, MoveListEntry<P>> {
        self.moves.iter()
    }

    /// Hops in cascade order: the new entry first, the free slot last.
    pub fn iter_chain(&self) -> std::iter::Rev<std::slice::Iter<'_, MoveListEntry<P>>> {
        self.moves.iter().rev()
    }

    /// Slot where the new entry will land.
    pub fn landing_slot(&self) -> Option<SlotId> {
        self.moves.last().map(|hop| hop.dst)
    }

    /// Candidate set of the new entry, recorded as its forward edges on placement.
    pub fn new_entry_edges(&self) -> &[SlotId] {
        &self.new_entry_edges
    }

    /// Consumes the list, returning the hops in execution order.
    pub fn into_moves(self) -> Vec<MoveListEntry<P>> {
        self.moves
    }

    pub(crate) fn into_parts(self) -> (Vec<MoveListEntry<P>>, ForwardEdges) {
        (self.moves, self.new_entry_edges)
    }
}

impl<'a, P> IntoIterator for &'a MoveList<P> {
    type Item = &'a MoveListEntry<P>;
    type IntoIter = std::slice::Iter<'a, MoveListEntry<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.moves.iter()
    }
}

/// Looks up the entry currently living at a slot.
///
/// The builder asks for the handle and payload of every entry it plans to
/// displace; the engine never inspects the payload. Residents are numbered in
/// arrival order, oldest first, as [`super::MoveGraph::get_node_data`] lists
/// them.
pub trait OccupantResolver<P> {
    /// Returns resident `resident` of `slot`.
    fn occupant(&self, slot: SlotId, resident: usize) -> Option<(EntryHandle, P)>;
}

impl<P, F> OccupantResolver<P> for F
where
    F: Fn(SlotId, usize) -> Option<(EntryHandle, P)>,
{
    fn occupant(&self, slot: SlotId, resident: usize) -> Option<(EntryHandle, P)> {
        self(slot, resident)
    }
}

/// Turns a successful search into an executable [`MoveList`].
pub struct MoveListBuilder<'g> {
    graph: &'g MoveGraph,
}

impl<'g> MoveListBuilder<'g> {
    /// Creates a builder reading the queue of the graph's last search.
    pub fn new(graph: &'g MoveGraph) -> Self {
        Self { graph }
    }

    /// Walks the parent chain of `hit` back to its root candidate.
    ///
    /// `candidates` must be the set the search was seeded with. Any
    /// disagreement between the queue and the current graph state fails
    /// with `Internal`.
    pub fn build<P, R>(
        &self,
        hit: &BfsHit,
        candidates: &[SlotId],
        handle: EntryHandle,
        payload: P,
        resolver: &R,
    ) -> Result<MoveList<P>>
    where
        R: OccupantResolver<P> + ?Sized,
    {
        let path = self.chain(hit, candidates)?;
        let mut moves = Vec::with_capacity(path.len());
        for pair in path.windows(2) {
            let (dst, src) = (pair[0].edge_idx, pair[1].edge_idx);
            let src_resident = pair[0].parent_resident as usize;
            let (entry_handle, carried) = resolver
                .occupant(src, src_resident)
                .ok_or_else(|| inconsistent(src, "no occupant to displace"))?;
            moves.push(MoveListEntry {
                src: Some(src),
                src_resident,
                dst,
                entry_handle,
                payload: carried,
            });
        }
        let root = path[path.len() - 1].edge_idx;
        moves.push(MoveListEntry {
            src: None,
            src_resident: 0,
            dst: root,
            entry_handle: handle,
            payload,
        });
        Ok(MoveList {
            moves,
            new_entry_edges: ForwardEdges::from_slice(candidates),
        })
    }

    /// Queue nodes from the terminal (index 0) back to the root.
    fn chain(
        &self,
        hit: &BfsHit,
        candidates: &[SlotId],
    ) -> Result<SmallVec<[BfsQueueNode; CUCKOO_MAX_NUM_MOVES]>> {
        let queue = self.graph.bfs_queue();
        let terminal = *queue
            .get(hit.terminal)
            .ok_or(CuckooError::Internal("terminal outside search queue"))?;
        if terminal.depth != hit.depth {
            return Err(CuckooError::Internal("terminal depth disagrees with search"));
        }
        if self.graph.edge_is_occupied(terminal.edge_idx)? {
            return Err(inconsistent(terminal.edge_idx, "terminal slot is no longer free"));
        }

        let mut path: SmallVec<[BfsQueueNode; CUCKOO_MAX_NUM_MOVES]> = SmallVec::new();
        path.push(terminal);
        let mut current = terminal;
        while let Some(parent_pos) = current.parent {
            let parent = *queue
                .get(parent_pos as usize)
                .ok_or(CuckooError::Internal("parent outside search queue"))?;
            if parent.depth + 1 != current.depth {
                return Err(CuckooError::Internal("parent depth out of sequence"));
            }
            let node = self
                .graph
                .get_node_data(parent.edge_idx)
                .ok_or_else(|| inconsistent(parent.edge_idx, "displaced slot lost its edges"))?;
            if !node.occupied {
                return Err(inconsistent(parent.edge_idx, "displaced slot is empty"));
            }
            let resident = node
                .residents
                .get(current.parent_resident as usize)
                .ok_or_else(|| inconsistent(parent.edge_idx, "displaced entry is gone"))?;
            if resident.forward_edges().get(current.parent_pos as usize) != Some(&current.edge_idx) {
                return Err(inconsistent(parent.edge_idx, "forward edges changed since search"));
            }
            path.push(parent);
            current = parent;
        }
        if current.depth != 0 || candidates.get(current.parent_pos as usize) != Some(&current.edge_idx)
        {
            return Err(CuckooError::Internal("chain root is not a seeded candidate"));
        }
        if path.len() > self.graph.max_moves() {
            return Err(CuckooError::Internal("chain exceeds move budget"));
        }
        Ok(path)
    }
}

fn inconsistent(slot: SlotId, reason: &'static str) -> CuckooError {
    warn!(slot = slot.0, reason, "cuckoo.move.list_inconsistent");
    CuckooError::Internal(reason)
}
