//! The scheduling artifact: one `BatchPlan` per batch, grouped into a
//! `SchedulePlan` that the orchestrator persists as YAML before execution.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Everything the event engine needs to simulate one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub batch_number: String,
    pub geography_id: String,
    pub species: String,
    pub start_date: NaiveDate,
    pub initial_population: u64,
    pub duration_days: u32,
    /// Zero-based freshwater station index within the geography.
    pub station_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers_hint: Option<usize>,
}

/// Ordered list of batch plans plus the planning parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePlan {
    pub schema_version: String,
    pub saturation: f64,
    pub stagger_days: u32,
    pub containers_per_batch: usize,
    pub batches: Vec<BatchPlan>,
}
