use tracing::{trace, warn};

use crate::types::{CuckooError, EntryHandle, Result, SlotId};

use super::move_list::MoveList;
use super::MoveGraph;

/// Hardware-synchronization collaborator driven by the [`MoveExecutor`].
///
/// Implementations own register math and instruction batching; the engine only
/// decides which slot is written or cleared and in what order. Errors are
/// surfaced to the caller unchanged.
pub trait SlotSync<P> {
    /// Writes `payload` for entry `handle` at `dst`.
    fn program_slot(&mut self, dst: SlotId, handle: EntryHandle, payload: &P) -> Result<()>;

    /// Clears entry `handle` from `src` after it was written elsewhere.
    fn invalidate_slot(&mut self, src: SlotId, handle: EntryHandle) -> Result<()>;
}

impl<P, S: SlotSync<P> + ?Sized> SlotSync<P> for &mut S {
    fn program_slot(&mut self, dst: SlotId, handle: EntryHandle, payload: &P) -> Result<()> {
        (**self).program_slot(dst, handle, payload)
    }

    fn invalidate_slot(&mut self, src: SlotId, handle: EntryHandle) -> Result<()> {
        (**self).invalidate_slot(src, handle)
    }
}

/// Applies a [`MoveList`] to the graph and to a [`SlotSync`] collaborator.
///
/// Per hop: program the destination, update graph occupancy, then invalidate
/// the source. A failed hop undoes every graph mutation made by this
/// execution; hardware writes already issued are the caller's to compensate.
pub struct MoveExecutor<'s, S: ?Sized> {
    sync: &'s mut S,
    is_txn: bool,
}

impl<'s, S: ?Sized> MoveExecutor<'s, S> {
    /// Creates an executor; `is_txn` logs graph mutations in the open transaction.
    pub fn new(sync: &'s mut S, is_txn: bool) -> Self {
        Self { sync, is_txn }
    }

    /// Executes every hop of `list` in order, returning the number applied.
    pub fn execute<P>(&mut self, graph: &mut MoveGraph, list: MoveList<P>) -> Result<usize>
    where
        S: SlotSync<P>,
    {
        let before = graph.occupied_entries();
        graph.savepoint_begin();
        match self.apply(graph, list) {
            Ok(applied) => {
                let grown = graph.occupied_entries() == before + 1;
                debug_assert!(grown, "move list changed occupancy by more than one");
                if !grown {
                    graph.savepoint_rollback();
                    return Err(CuckooError::Internal("move list changed occupancy by more than one"));
                }
                graph.savepoint_release();
                Ok(applied)
            }
            Err(err) => {
                graph.savepoint_rollback();
                Err(err)
            }
        }
    }

    fn apply<P>(&mut self, graph: &mut MoveGraph, list: MoveList<P>) -> Result<usize>
    where
        S: SlotSync<P>,
    {
        let (moves, new_entry_edges) = list.into_parts();
        let total = moves.len();
        for (hop, entry) in moves.into_iter().enumerate() {
            trace!(
                hop,
                total,
                dst = entry.dst.0,
                src = entry.src.map(|slot| slot.0),
                "cuckoo.move.apply"
            );
            let step = self
                .sync
                .program_slot(entry.dst, entry.entry_handle, &entry.payload)
                .and_then(|()| match entry.src {
                    Some(src) => {
                        graph.move_resident(entry.dst, src, entry.src_resident, self.is_txn)
                    }
                    None => graph.add_entry(entry.dst, &new_entry_edges, self.is_txn),
                })
                .and_then(|()| match entry.src {
                    Some(src) => self.sync.invalidate_slot(src, entry.entry_handle),
                    None => Ok(()),
                });
            if let Err(err) = step {
                warn!(hop, total, dst = entry.dst.0, error = %err, "cuckoo.move.exec_failed");
                return Err(err);
            }
        }
        Ok(total)
    }
}
