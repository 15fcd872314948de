use aquasim_schemas::stage::LifecycleStage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(
        "Capacity exceeded on container '{container_id}' for batch '{batch_number}': \
         {biomass_kg:.1} kg against a limit of {max_biomass_kg:.1} kg"
    )]
    CapacityExceeded {
        batch_number: String,
        container_id: String,
        biomass_kg: f64,
        max_biomass_kg: f64,
    },

    #[error(
        "Container '{container_id}' is busy with batch '{occupant}' \
         (requested by batch '{batch_number}')"
    )]
    ContainerBusy {
        batch_number: String,
        container_id: String,
        occupant: String,
    },

    #[error("Invariant failed for batch '{batch_number}' on day {day_number}: {reason}")]
    InvariantFailed {
        batch_number: String,
        day_number: u32,
        reason: String,
    },

    #[error("Feed stock low for '{feed_name}' at station '{station_id}'")]
    FeedStockLow {
        station_id: String,
        feed_name: String,
    },

    #[error("No {kind} policy found for species '{species}' in geography '{geography_id}'")]
    NoPolicyFound {
        kind: String,
        species: String,
        geography_id: String,
    },

    #[error("No feed named '{feed_name}' exists for stage {stage:?}")]
    UnknownFeedName {
        stage: LifecycleStage,
        feed_name: String,
    },

    #[error("No temperature profile seeded for geography '{geography_id}'")]
    NoTemperatureProfile { geography_id: String },

    #[error("Station index {index} out of range for geography '{geography_id}'")]
    UnknownStation { geography_id: String, index: usize },

    #[error("Container '{0}' not found in the infrastructure directory")]
    UnknownContainer(String),

    #[error("Assignment {0} not found in the ledger")]
    UnknownAssignment(u64),

    #[error("Workflow '{workflow_id}' rejected {operation} in state {state}")]
    WorkflowState {
        workflow_id: String,
        operation: String,
        state: String,
    },

    #[error("Event publisher failed on topic '{topic}': {reason}")]
    PublisherFailed { topic: String, reason: String },

    #[error("Batch '{batch_number}' cancelled on day {day_number}")]
    Cancelled {
        batch_number: String,
        day_number: u32,
    },

    #[error("Plan is infeasible: {0}")]
    PlanInfeasible(String),

    #[error("I/O error for file '{0}': {1}")]
    FileIO(String, #[source] std::io::Error),

    #[error("Failed to parse YAML from '{0}': {1}")]
    YamlParsing(String, #[source] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Failed to process CSV file '{0}': {1}")]
    CsvError(String, #[source] csv::Error),
}

impl SimError {
    /// Recoverable kinds are handled locally (alternate destination,
    /// replenishment); everything else is fatal to the batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SimError::ContainerBusy { .. } | SimError::FeedStockLow { .. }
        )
    }
}
