use std::fmt;

use smallvec::SmallVec;

use crate::types::{CuckooError, EntryHandle, Result, SlotId};

use super::executor::SlotSync;
use super::move_list::OccupantResolver;

/// One call received by [`MemorySlots`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncOp {
    /// `program_slot(slot, handle, _)`.
    Program {
        /// Slot written.
        slot: SlotId,
        /// Entry written.
        handle: EntryHandle,
    },
    /// `invalidate_slot(slot, handle)`.
    Invalidate {
        /// Slot cleared.
        slot: SlotId,
        /// Entry cleared.
        handle: EntryHandle,
    },
}

/// Error returned by [`MemorySlots`] once its fault budget is spent.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct InjectedFault {
    /// Zero-based index of the sync call that failed.
    pub call: usize,
}

impl fmt::Display for InjectedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "injected fault at sync call {}", self.call)
    }
}

impl std::error::Error for InjectedFault {}

/// In-memory stand-in for table hardware.
///
/// Holds the entries programmed into each slot in arrival order, matching the
/// resident order the graph keeps, answers occupant lookups for the
/// move-list builder, and records every sync call. A fault can be armed to
/// fail the N-th call.
#[derive(Clone, Debug)]
pub struct MemorySlots<P> {
    slots: Vec<SmallVec<[(EntryHandle, P); 1]>>,
    log: Vec<SyncOp>,
    calls: usize,
    fail_at: Option<usize>,
}

impl<P> MemorySlots<P> {
    /// Creates a store with `num_slots` empty slots.
    pub fn new(num_slots: u32) -> Self {
        let mut slots = Vec::with_capacity(num_slots as usize);
        slots.resize_with(num_slots as usize, SmallVec::new);
        Self {
            slots,
            log: Vec::new(),
            calls: 0,
            fail_at: None,
        }
    }

    /// Stores an entry directly, bypassing the sync log.
    pub fn seed(&mut self, slot: SlotId, handle: EntryHandle, payload: P) -> Result<()> {
        let entries = self
            .slots
            .get_mut(slot.index())
            .ok_or(CuckooError::InvalidArgument("slot index out of range"))?;
        entries.push((handle, payload));
        Ok(())
    }

    /// Removes entry `handle` from `slot`, returning its payload.
    pub fn remove(&mut self, slot: SlotId, handle: EntryHandle) -> Option<P> {
        let entries = self.slots.get_mut(slot.index())?;
        let pos = entries.iter().position(|(h, _)| *h == handle)?;
        Some(entries.remove(pos).1)
    }

    /// Entries currently stored at `slot`, oldest first.
    pub fn entries(&self, slot: SlotId) -> &[(EntryHandle, P)] {
        self.slots
            .get(slot.index())
            .map(|entries| entries.as_slice())
            .unwrap_or(&[])
    }

    /// Slot currently holding `handle`, if any.
    pub fn find(&self, handle: EntryHandle) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|entries| entries.iter().any(|(h, _)| *h == handle))
            .map(|idx| SlotId(idx as u32))
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        self.slots.iter().map(|entries| entries.len()).sum()
    }

    /// Whether no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sync calls received so far, in order.
    pub fn log(&self) -> &[SyncOp] {
        &self.log
    }

    /// Clears the sync log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Fails the sync call `after` calls from now (0 fails the next one).
    pub fn fail_after(&mut self, after: usize) {
        self.fail_at = Some(self.calls + after);
    }

    /// Disarms a pending fault.
    pub fn disarm(&mut self) {
        self.fail_at = None;
    }

    fn begin_call(&mut self) -> Result<()> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_at == Some(call) {
            self.fail_at = None;
            return Err(CuckooError::Sync(Box::new(InjectedFault { call })));
        }
        Ok(())
    }
}

impl<P: Clone> SlotSync<P> for MemorySlots<P> {
    fn program_slot(&mut self, dst: SlotId, handle: EntryHandle, payload: &P) -> Result<()> {
        self.begin_call()?;
        let entries = self
            .slots
            .get_mut(dst.index())
            .ok_or(CuckooError::InvalidArgument("slot index out of range"))?;
        entries.push((handle, payload.clone()));
        self.log.push(SyncOp::Program { slot: dst, handle });
        Ok(())
    }

    fn invalidate_slot(&mut self, src: SlotId, handle: EntryHandle) -> Result<()> {
        self.begin_call()?;
        if self.remove(src, handle).is_none() {
            return Err(CuckooError::Internal("invalidated entry not present"));
        }
        self.log.push(SyncOp::Invalidate { slot: src, handle });
        Ok(())
    }
}

impl<P: Clone> OccupantResolver<P> for MemorySlots<P> {
    fn occupant(&self, slot: SlotId, resident: usize) -> Option<(EntryHandle, P)> {
        self.slots.get(slot.index())?.get(resident).cloned()
    }
}
