use tracing::{debug, trace};

use crate::types::{CuckooError, Result, SlotId};

use super::MoveGraph;

/// One queue position of a breadth-first search.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BfsQueueNode {
    /// Slot explored at this position.
    pub edge_idx: SlotId,
    /// Hops from the new entry's candidate set (roots are depth 0).
    pub depth: u32,
    /// Queue position that discovered this one; `None` for roots.
    pub parent: Option<u32>,
    /// Resident of the parent node displaced into this slot (zero for roots).
    pub parent_resident: u32,
    /// Index into that resident's forward edges (or the candidate set for roots).
    pub parent_pos: u32,
}

/// Successful search result: the queue position of a free slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BfsHit {
    /// Queue position of the free terminal slot.
    pub terminal: usize,
    /// Depth of the terminal; the chain needs `depth + 1` moves.
    pub depth: u32,
    /// Number of queue positions popped before the hit.
    pub explored: usize,
}

impl BfsHit {
    /// Number of moves the resulting chain needs, including the final placement.
    pub fn moves(&self) -> usize {
        self.depth as usize + 1
    }
}

/// Fixed-capacity search queue owned by the graph and reset per search.
///
/// Positions are never reused within one search because children refer to
/// their parents by position.
#[derive(Debug)]
pub(crate) struct BfsQueue {
    entries: Vec<BfsQueueNode>,
    capacity: usize,
    head: usize,
    seen: Vec<u32>,
    epoch: u32,
}

impl BfsQueue {
    pub(crate) fn with_capacity(capacity: usize, num_slots: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CuckooError::InvalidArgument("bfs queue length must be positive"));
        }
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| CuckooError::ResourceExhausted("bfs queue allocation failed"))?;
        let mut seen = Vec::new();
        seen.try_reserve_exact(num_slots)
            .map_err(|_| CuckooError::ResourceExhausted("bfs visit array allocation failed"))?;
        seen.resize(num_slots, 0);
        Ok(Self {
            entries,
            capacity,
            head: 0,
            seen,
            epoch: 0,
        })
    }

    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.head = 0;
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.seen.fill(0);
            self.epoch = 1;
        }
    }

    /// Marks `slot` visited; returns false when it already was.
    fn visit(&mut self, slot: SlotId) -> bool {
        let stamp = &mut self.seen[slot.index()];
        if *stamp == self.epoch {
            return false;
        }
        *stamp = self.epoch;
        true
    }

    fn push(&mut self, node: BfsQueueNode) -> Result<()> {
        if self.entries.len() == self.capacity {
            return Err(CuckooError::ResourceExhausted("bfs queue full"));
        }
        self.entries.push(node);
        Ok(())
    }

    pub(crate) fn entries(&self) -> &[BfsQueueNode] {
        &self.entries
    }
}

impl MoveGraph {
    /// Finds the shortest eviction chain from `candidates` to a free slot.
    ///
    /// Candidates are seeded in order and expanded strictly first-in first-out.
    /// An occupied node offers the alternates of each resident, oldest first,
    /// so among chains of equal length the one enumerated first wins. Fails with
    /// `ResourceExhausted` when the queue fills up or no free slot is reachable
    /// within [`MoveGraph::max_moves`]. The graph itself is not modified.
    pub fn bfs_search(&mut self, candidates: &[SlotId]) -> Result<BfsHit> {
        if candidates.is_empty() {
            return Err(CuckooError::InvalidArgument("empty candidate set"));
        }
        self.check_candidates(candidates)?;
        trace!(candidates = candidates.len(), "cuckoo.bfs.start");

        let Self {
            nodes,
            edges,
            queue,
            max_moves,
            ..
        } = self;
        queue.reset();

        for (pos, slot) in candidates.iter().enumerate() {
            if !queue.visit(*slot) {
                continue;
            }
            queue.push(BfsQueueNode {
                edge_idx: *slot,
                depth: 0,
                parent: None,
                parent_resident: 0,
                parent_pos: pos as u32,
            })?;
        }

        while queue.head < queue.entries.len() {
            let pos = queue.head;
            let current = queue.entries[pos];
            queue.head += 1;
            if !edges[current.edge_idx.index()].occupied {
                debug!(
                    depth = current.depth,
                    explored = queue.head,
                    slot = current.edge_idx.0,
                    "cuckoo.bfs.found"
                );
                return Ok(BfsHit {
                    terminal: pos,
                    depth: current.depth,
                    explored: queue.head,
                });
            }
            let next_depth = current.depth + 1;
            if next_depth as usize >= *max_moves {
                continue;
            }
            let node = &nodes[current.edge_idx.index()];
            for (resident_pos, resident) in node.residents.iter().enumerate() {
                for (edge_pos, next) in resident.forward_edges.iter().enumerate() {
                    if !queue.visit(*next) {
                        continue;
                    }
                    if let Err(err) = queue.push(BfsQueueNode {
                        edge_idx: *next,
                        depth: next_depth,
                        parent: Some(pos as u32),
                        parent_resident: resident_pos as u32,
                        parent_pos: edge_pos as u32,
                    }) {
                        debug!(explored = queue.head, reason = "queue_full", "cuckoo.bfs.exhausted");
                        return Err(err);
                    }
                }
            }
        }

        debug!(explored = queue.head, reason = "no_free_slot", "cuckoo.bfs.exhausted");
        Err(CuckooError::ResourceExhausted("no free slot within move budget"))
    }

    /// Queue contents left by the most recent search.
    pub fn bfs_queue(&self) -> &[BfsQueueNode] {
        self.queue.entries()
    }
}
