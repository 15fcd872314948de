//! Scenario declarations: the parameterized growth plans consumed by the
//! projection engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    pub name: String,
    pub initial_count: u64,
    pub initial_weight_g: f64,
    pub start_date: NaiveDate,
    pub duration_days: u32,
    /// Day offset into the standard lifecycle at which the projection
    /// starts; drives time-based stage selection. A from-batch scenario
    /// created at batch day 180 carries 180 here.
    pub lifecycle_day_offset: u32,
    pub tgc_model_id: String,
    pub fcr_model_id: String,
    pub mortality_model_id: String,
    /// Batch the scenario was derived from, when engine-created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
}
