use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::graph_types::CUCKOO_MAX_NUM_MOVES;

/// Trait for collecting per-stage placement statistics.
///
/// The engine calls these hooks from [`super::MoveGraph::place_entry`]; the
/// lower-level search, build and execute steps never touch statistics.
pub trait PlacementMetrics: Send + Sync {
    /// Records a successful placement that needed `moves` hops (1 means no eviction).
    fn placement_succeeded(&self, moves: usize);

    /// Records a failed placement.
    ///
    /// # Parameters
    /// * `reason` - The error kind, e.g. "resource_exhausted" or "sync".
    fn placement_failed(&self, reason: &'static str);

    /// Records how many queue positions a successful search popped.
    fn search_explored(&self, queue_nodes: usize);
}

/// A no-op implementation of [`PlacementMetrics`] that discards everything.
#[derive(Default)]
pub struct NoopMetrics;

impl PlacementMetrics for NoopMetrics {
    fn placement_succeeded(&self, _moves: usize) {}
    fn placement_failed(&self, _reason: &'static str) {}
    fn search_explored(&self, _queue_nodes: usize) {}
}

/// A thread-safe counter-based implementation of [`PlacementMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of successful placements.
    pub placements: AtomicU64,

    /// Placements rejected because the table was congested.
    pub failures_exhausted: AtomicU64,

    /// Placements that failed for any other reason.
    pub failures_other: AtomicU64,

    /// Successful placements bucketed by move count (index = moves).
    pub move_histogram: [AtomicU64; CUCKOO_MAX_NUM_MOVES + 1],

    /// Total queue positions popped by successful searches.
    pub bfs_nodes_explored: AtomicU64,
}

impl CounterMetrics {
    /// Snapshot of the move-count histogram.
    pub fn histogram(&self) -> [u64; CUCKOO_MAX_NUM_MOVES + 1] {
        let mut out = [0u64; CUCKOO_MAX_NUM_MOVES + 1];
        for (slot, counter) in out.iter_mut().zip(self.move_histogram.iter()) {
            *slot = counter.load(Ordering::Relaxed);
        }
        out
    }

    /// Total failed placements.
    pub fn failures(&self) -> u64 {
        self.failures_exhausted.load(Ordering::Relaxed) + self.failures_other.load(Ordering::Relaxed)
    }
}

impl PlacementMetrics for CounterMetrics {
    fn placement_succeeded(&self, moves: usize) {
        self.placements.fetch_add(1, Ordering::Relaxed);
        let bucket = moves.min(CUCKOO_MAX_NUM_MOVES);
        self.move_histogram[bucket].fetch_add(1, Ordering::Relaxed);
    }

    fn placement_failed(&self, reason: &'static str) {
        match reason {
            "resource_exhausted" => {
                self.failures_exhausted.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.failures_other.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn search_explored(&self, queue_nodes: usize) {
        self.bfs_nodes_explored
            .fetch_add(queue_nodes as u64, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`].
pub fn default_metrics() -> Arc<dyn PlacementMetrics> {
    Arc::new(NoopMetrics)
}
