use tracing::debug;

use crate::types::{CuckooError, Result};

use super::executor::{MoveExecutor, SlotSync};
use super::graph_types::{PlacementOutcome, PlacementRequest};
use super::move_list::{MoveListBuilder, OccupantResolver};
use super::MoveGraph;

impl MoveGraph {
    /// Places one new entry: search, build the move list, execute it.
    ///
    /// `store` answers occupant lookups and receives the hardware writes.
    /// The outcome (or failure) is reported to the configured metrics sink.
    /// On failure the graph is left as it was before the call.
    pub fn place_entry<P, T>(
        &mut self,
        request: PlacementRequest<'_, P>,
        store: &mut T,
        is_txn: bool,
    ) -> Result<PlacementOutcome>
    where
        T: SlotSync<P> + OccupantResolver<P> + ?Sized,
    {
        let result = self.place_inner(request, store, is_txn);
        match &result {
            Ok(outcome) => {
                self.metrics().search_explored(outcome.explored);
                self.metrics().placement_succeeded(outcome.moves);
                debug!(
                    slot = outcome.slot.0,
                    moves = outcome.moves,
                    "cuckoo.place.completed"
                );
            }
            Err(err) => self.metrics().placement_failed(err.kind()),
        }
        result
    }

    fn place_inner<P, T>(
        &mut self,
        request: PlacementRequest<'_, P>,
        store: &mut T,
        is_txn: bool,
    ) -> Result<PlacementOutcome>
    where
        T: SlotSync<P> + OccupantResolver<P> + ?Sized,
    {
        let PlacementRequest {
            candidates,
            handle,
            payload,
        } = request;
        let hit = self.bfs_search(candidates)?;
        let list = MoveListBuilder::new(self).build(&hit, candidates, handle, payload, &*store)?;
        let slot = list
            .landing_slot()
            .ok_or(CuckooError::Internal("empty move list"))?;
        let moves = MoveExecutor::new(store, is_txn).execute(self, list)?;
        Ok(PlacementOutcome {
            slot,
            moves,
            explored: hit.explored,
        })
    }
}
