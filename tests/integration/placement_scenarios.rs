#![allow(missing_docs)]

use std::sync::atomic::Ordering;
use std::sync::{Arc, Once};

use exm_cuckoo::cuckoo::{
    CounterMetrics, CuckooOptions, MemorySlots, MoveExecutor, MoveGraph, MoveListBuilder,
    PlacementRequest, SyncOp, TxnState,
};
use exm_cuckoo::types::{CuckooError, EntryHandle, Result, SlotId};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exm_cuckoo=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

fn slots(ids: &[u32]) -> Vec<SlotId> {
    ids.iter().copied().map(SlotId).collect()
}

/// Seeds `graph` and `mem` with one entry per `(slot, handle, alternates)`.
fn seed(
    graph: &mut MoveGraph,
    mem: &mut MemorySlots<String>,
    entries: &[(u32, u32, &[u32])],
) -> Result<()> {
    for (slot, handle, alternates) in entries {
        graph.add_entry(SlotId(*slot), &slots(alternates), false)?;
        mem.seed(SlotId(*slot), EntryHandle(*handle), format!("entry-{handle}"))?;
    }
    Ok(())
}

#[test]
fn displaced_way0_occupant_moves_to_free_way2() -> Result<()> {
    init_tracing();
    let mut graph = MoveGraph::new(4, &CuckooOptions::new())?;
    let mut mem = MemorySlots::new(4);
    seed(
        &mut graph,
        &mut mem,
        &[(0, 10, &[0, 2]), (1, 11, &[1, 3]), (3, 13, &[3, 1])],
    )?;
    let occupied_before = graph.occupied_entries();

    let candidates = slots(&[0, 1]);
    let hit = graph.bfs_search(&candidates)?;
    assert_eq!(hit.moves(), 2);
    let list = MoveListBuilder::new(&graph).build(
        &hit,
        &candidates,
        EntryHandle(99),
        "new".to_string(),
        &mem,
    )?;
    let hops: Vec<_> = list.iter().map(|hop| (hop.src, hop.dst)).collect();
    assert_eq!(hops, vec![(Some(SlotId(0)), SlotId(2)), (None, SlotId(0))]);

    MoveExecutor::new(&mut mem, false).execute(&mut graph, list)?;

    assert_eq!(graph.occupied_entries(), occupied_before + 1);
    assert_eq!(mem.entries(SlotId(0)), &[(EntryHandle(99), "new".to_string())]);
    assert_eq!(mem.entries(SlotId(2)), &[(EntryHandle(10), "entry-10".to_string())]);
    assert_eq!(mem.entries(SlotId(1)), &[(EntryHandle(11), "entry-11".to_string())]);
    assert!(!mem
        .log()
        .iter()
        .any(|op| matches!(op, SyncOp::Program { slot: SlotId(1), .. })));
    for slot in 0..4 {
        assert!(graph.node_is_occupied(SlotId(slot))?);
        assert!(graph.edge_is_occupied(SlotId(slot))?);
    }
    Ok(())
}

#[test]
fn saturated_cycle_is_congestion_without_mutation() -> Result<()> {
    init_tracing();
    let mut graph = MoveGraph::new(4, &CuckooOptions::new())?;
    let mut mem = MemorySlots::new(4);
    seed(
        &mut graph,
        &mut mem,
        &[(0, 10, &[0, 1]), (1, 11, &[1, 2]), (2, 12, &[2, 3]), (3, 13, &[3, 0])],
    )?;
    let before = graph.occupancy_snapshot();

    let err = graph
        .place_entry(
            PlacementRequest {
                candidates: &slots(&[0, 1]),
                handle: EntryHandle(99),
                payload: "new".to_string(),
            },
            &mut mem,
            true,
        )
        .unwrap_err();

    assert!(matches!(err, CuckooError::ResourceExhausted(_)));
    assert!(err.is_retryable());
    assert_eq!(graph.occupancy_snapshot(), before);
    assert_eq!(graph.txn_state(), TxnState::Idle);
    assert!(mem.log().is_empty());
    Ok(())
}

#[test]
fn long_chain_cascades_in_execution_order() -> Result<()> {
    init_tracing();
    let mut graph = MoveGraph::new(6, &CuckooOptions::new())?;
    let mut mem = MemorySlots::new(6);
    seed(
        &mut graph,
        &mut mem,
        &[
            (0, 10, &[0, 1]),
            (1, 11, &[1, 2]),
            (2, 12, &[2, 3]),
            (3, 13, &[3, 4]),
        ],
    )?;

    let outcome = graph.place_entry(
        PlacementRequest {
            candidates: &slots(&[0]),
            handle: EntryHandle(99),
            payload: "new".to_string(),
        },
        &mut mem,
        false,
    )?;

    assert_eq!(outcome.slot, SlotId(0));
    assert_eq!(outcome.moves, 5);
    assert_eq!(outcome.relocations(), 4);
    let programs: Vec<_> = mem
        .log()
        .iter()
        .filter_map(|op| match op {
            SyncOp::Program { slot, handle } => Some((slot.0, handle.0)),
            SyncOp::Invalidate { .. } => None,
        })
        .collect();
    assert_eq!(programs, vec![(4, 13), (3, 12), (2, 11), (1, 10), (0, 99)]);
    for (slot, handle) in [(0, 99), (1, 10), (2, 11), (3, 12), (4, 13)] {
        assert_eq!(mem.find(EntryHandle(handle)), Some(SlotId(slot)));
    }
    let landed = graph.get_node_data(SlotId(4)).expect("occupied");
    assert_eq!(landed.forward_edges, &slots(&[3, 4])[..]);
    Ok(())
}

#[test]
fn packed_nodes_absorb_entries_before_evicting() -> Result<()> {
    init_tracing();
    let opts = CuckooOptions::new().entries_per_node(2);
    let mut graph = MoveGraph::new(3, &opts)?;
    let mut mem: MemorySlots<String> = MemorySlots::new(3);
    for handle in 0..4u32 {
        let outcome = graph.place_entry(
            PlacementRequest {
                candidates: &slots(&[0, 1]),
                handle: EntryHandle(handle),
                payload: format!("entry-{handle}"),
            },
            &mut mem,
            false,
        )?;
        assert_eq!(outcome.moves, 1);
    }
    assert!(graph.edge_is_occupied(SlotId(0))?);
    assert!(graph.edge_is_occupied(SlotId(1))?);
    assert_eq!(graph.occupied_entries(), 4);

    let err = graph.place_entry(
        PlacementRequest {
            candidates: &slots(&[0, 1]),
            handle: EntryHandle(9),
            payload: "late".to_string(),
        },
        &mut mem,
        false,
    );
    assert!(err.is_err(), "alternates only point back into full nodes");

    graph.insert_node(SlotId(1), &slots(&[1, 2]), false)?;
    let outcome = graph.place_entry(
        PlacementRequest {
            candidates: &slots(&[0, 1]),
            handle: EntryHandle(9),
            payload: "late".to_string(),
        },
        &mut mem,
        false,
    )?;
    assert_eq!(outcome.slot, SlotId(1));
    assert_eq!(outcome.moves, 2);
    assert_eq!(mem.find(EntryHandle(3)), Some(SlotId(2)));
    assert_eq!(graph.occupied_entries(), 5);
    Ok(())
}

#[test]
fn older_co_resident_moves_when_newest_is_stuck() -> Result<()> {
    init_tracing();
    let opts = CuckooOptions::new().entries_per_node(2);
    let mut graph = MoveGraph::new(3, &opts)?;
    let mut mem: MemorySlots<String> = MemorySlots::new(3);
    seed(&mut graph, &mut mem, &[(0, 10, &[0, 2]), (0, 11, &[0])])?;
    assert!(graph.edge_is_occupied(SlotId(0))?);

    let outcome = graph.place_entry(
        PlacementRequest {
            candidates: &slots(&[0]),
            handle: EntryHandle(99),
            payload: "new".to_string(),
        },
        &mut mem,
        false,
    )?;
    assert_eq!(outcome.slot, SlotId(0));
    assert_eq!(outcome.moves, 2);
    assert_eq!(mem.find(EntryHandle(10)), Some(SlotId(2)));
    assert_eq!(mem.find(EntryHandle(11)), Some(SlotId(0)));
    let at_zero: Vec<u32> = mem.entries(SlotId(0)).iter().map(|(h, _)| h.0).collect();
    assert_eq!(at_zero, vec![11, 99]);

    let moved = graph.get_node_data(SlotId(2)).expect("slot 2 occupied");
    assert_eq!(moved.forward_edges, &slots(&[0, 2])[..]);
    let home = graph.get_node_data(SlotId(0)).expect("slot 0 occupied");
    let edges: Vec<Vec<SlotId>> = home.residents.iter().map(|r| r.forward_edges().to_vec()).collect();
    assert_eq!(edges, vec![slots(&[0]), slots(&[0])]);
    assert_eq!(graph.occupied_entries(), 3);
    Ok(())
}

#[test]
fn counters_reflect_outcomes() -> Result<()> {
    init_tracing();
    let metrics = Arc::new(CounterMetrics::default());
    let mut graph = MoveGraph::new(2, &CuckooOptions::new().metrics(metrics.clone()))?;
    let mut mem: MemorySlots<String> = MemorySlots::new(2);
    for handle in 0..3u32 {
        let _ = graph.place_entry(
            PlacementRequest {
                candidates: &slots(&[0, 1]),
                handle: EntryHandle(handle),
                payload: String::new(),
            },
            &mut mem,
            false,
        );
    }
    let _ = graph.place_entry(
        PlacementRequest {
            candidates: &[],
            handle: EntryHandle(7),
            payload: String::new(),
        },
        &mut mem,
        false,
    );
    assert_eq!(metrics.placements.load(Ordering::Relaxed), 2);
    assert_eq!(metrics.failures_exhausted.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.failures_other.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.failures(), 2);
    assert_eq!(metrics.histogram()[1], 2);
    Ok(())
}
