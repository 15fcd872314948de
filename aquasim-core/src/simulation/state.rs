use crate::events::EventEnvelope;
use crate::metrics::BatchCounters;
use crate::transfer::TransferWorkflow;
use aquasim_schemas::scenario::Scenario;
use aquasim_schemas::stage::LifecycleStage;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Completed,
    Terminated,
}

/// A projection run pinned as a batch's displayed baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedRun {
    pub scenario_id: String,
    pub run_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_number: String,
    pub species: String,
    pub start_date: NaiveDate,
    pub lifecycle_stage: LifecycleStage,
    pub status: BatchStatus,
    pub pinned_projection_run: Option<PinnedRun>,
}

/// Live state of one batch simulation, mutated day by day.
#[derive(Debug)]
pub struct BatchState {
    pub batch: Batch,
    pub day: u32,
    pub date: NaiveDate,
    pub station_id: String,
    pub events: Vec<EventEnvelope>,
    pub workflows: Vec<TransferWorkflow>,
    pub scenarios: Vec<Scenario>,
    pub counters: BatchCounters,
}

/// Everything one finished batch hands back to the orchestrator.
#[derive(Debug)]
pub struct BatchRunOutcome {
    pub batch: Batch,
    pub days_simulated: u32,
    pub counters: BatchCounters,
    pub events: Vec<EventEnvelope>,
    pub workflows: Vec<TransferWorkflow>,
    pub scenarios: Vec<Scenario>,
    /// Populated when the batch was terminated early.
    pub termination_reason: Option<String>,
}
