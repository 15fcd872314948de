//! Plain aggregate counters: per-batch operational totals and the
//! per-orchestrator-run summary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchCounters {
    pub events_emitted: u64,
    pub transfers_executed: u64,
    pub mortality_total: u64,
    pub feed_consumed_kg: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub wall_time_seconds: f64,
    pub batches_completed: usize,
    pub batches_failed: usize,
    pub peak_worker_occupancy: usize,
    pub total_events: u64,
    pub total_feed_kg: f64,
    pub projection_runs_computed: usize,
}
