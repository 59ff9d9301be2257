#![allow(missing_docs)]

use exm_cuckoo::cuckoo::{
    CuckooOptions, InjectedFault, MemorySlots, MoveGraph, PlacementRequest, TxnState,
};
use exm_cuckoo::types::{CuckooError, EntryHandle, Result, SlotId};

fn slots(ids: &[u32]) -> Vec<SlotId> {
    ids.iter().copied().map(SlotId).collect()
}

fn place(
    graph: &mut MoveGraph,
    mem: &mut MemorySlots<u64>,
    handle: u32,
    candidates: &[u32],
) -> Result<SlotId> {
    let outcome = graph.place_entry(
        PlacementRequest {
            candidates: &slots(candidates),
            handle: EntryHandle(handle),
            payload: u64::from(handle) << 8,
        },
        mem,
        true,
    )?;
    Ok(outcome.slot)
}

#[test]
fn batch_abort_undoes_every_placement() -> Result<()> {
    let mut graph = MoveGraph::new(8, &CuckooOptions::new())?;
    let mut mem = MemorySlots::new(8);
    place(&mut graph, &mut mem, 1, &[0, 4])?;
    place(&mut graph, &mut mem, 2, &[1, 5])?;
    graph.txn_commit();
    let committed = graph.occupancy_snapshot();

    place(&mut graph, &mut mem, 3, &[0, 1])?;
    place(&mut graph, &mut mem, 4, &[0, 1])?;
    graph.delete_entry(SlotId(5), true)?;
    assert_eq!(graph.txn_state(), TxnState::Dirty);

    graph.txn_abort();
    assert_eq!(graph.occupancy_snapshot(), committed);
    assert_eq!(graph.occupied_entries(), 2);
    assert_eq!(graph.txn_state(), TxnState::Idle);
    Ok(())
}

#[test]
fn batch_commit_keeps_every_placement() -> Result<()> {
    let mut graph = MoveGraph::new(8, &CuckooOptions::new())?;
    let mut mem = MemorySlots::new(8);
    place(&mut graph, &mut mem, 1, &[0, 4])?;
    place(&mut graph, &mut mem, 2, &[0, 5])?;
    let before_commit = graph.occupancy_snapshot();
    graph.txn_commit();
    assert_eq!(graph.occupancy_snapshot(), before_commit);
    assert_eq!(graph.dirty_count(), 0);
    assert_eq!(graph.occupied_entries(), 2);
    Ok(())
}

#[test]
fn failed_placement_keeps_earlier_batch_work() -> Result<()> {
    let mut graph = MoveGraph::new(4, &CuckooOptions::new())?;
    let mut mem = MemorySlots::new(4);
    place(&mut graph, &mut mem, 1, &[0, 2])?;
    let after_first = graph.occupancy_snapshot();
    let dirty_after_first = graph.dirty_count();

    // Evicts entry 1 from slot 0 to slot 2; the third sync call fails.
    mem.fail_after(2);
    let err = place(&mut graph, &mut mem, 2, &[0]).unwrap_err();
    match &err {
        CuckooError::Sync(source) => assert!(source.downcast_ref::<InjectedFault>().is_some()),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!err.is_retryable());
    assert_eq!(graph.occupancy_snapshot(), after_first);
    assert_eq!(graph.dirty_count(), dirty_after_first);

    graph.txn_abort();
    assert_eq!(graph.occupied_entries(), 0);
    let empty = MoveGraph::new(4, &CuckooOptions::new())?;
    assert_eq!(graph.occupancy_snapshot(), empty.occupancy_snapshot());
    Ok(())
}

#[test]
fn abort_after_evictions_restores_forward_edges() -> Result<()> {
    let mut graph = MoveGraph::new(6, &CuckooOptions::new())?;
    let mut mem = MemorySlots::new(6);
    place(&mut graph, &mut mem, 1, &[0, 1])?;
    place(&mut graph, &mut mem, 2, &[1, 2])?;
    graph.txn_commit();
    let edges_0 = graph.get_node_data(SlotId(0)).map(|d| d.forward_edges.to_vec());
    let edges_1 = graph.get_node_data(SlotId(1)).map(|d| d.forward_edges.to_vec());

    // Entry 2 moves 1 -> 2, entry 1 moves 0 -> 1, entry 3 lands at 0.
    assert_eq!(place(&mut graph, &mut mem, 3, &[0])?, SlotId(0));
    assert_eq!(
        graph.get_node_data(SlotId(2)).map(|d| d.forward_edges.to_vec()),
        Some(slots(&[1, 2]))
    );

    graph.txn_abort();
    assert_eq!(graph.get_node_data(SlotId(0)).map(|d| d.forward_edges.to_vec()), edges_0);
    assert_eq!(graph.get_node_data(SlotId(1)).map(|d| d.forward_edges.to_vec()), edges_1);
    assert!(graph.get_node_data(SlotId(2)).is_none());
    assert!(!graph.edge_is_occupied(SlotId(2))?);
    Ok(())
}
