//! The emitted event stream: per-day domain events wrapped in dated
//! envelopes, the outbound publisher contract, and the in-memory buffer
//! implementation used for bulk post-processing and tests.

use crate::error::SimError;
use crate::ledger::AssignmentId;
use aquasim_schemas::stage::LifecycleStage;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Outbound publication topics. Internal bookkeeping events (environmental
/// readings, assignment lifecycle, feed purchases, lice counts) share the
/// stream but are not pushed to external subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Feeding,
    Mortality,
    GrowthSample,
    TransferActionCompleted,
    WorkflowCompleted,
    ProjectionRunCreated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    WaterTemperature,
    DissolvedOxygen,
    Ph,
    Salinity,
    Co2,
    Ammonia,
    Turbidity,
}

impl SensorType {
    pub const ALL: [SensorType; 7] = [
        SensorType::WaterTemperature,
        SensorType::DissolvedOxygen,
        SensorType::Ph,
        SensorType::Salinity,
        SensorType::Co2,
        SensorType::Ammonia,
        SensorType::Turbidity,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedingMethod {
    AutoFeeder,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationEvent {
    AssignmentOpened {
        assignment_id: AssignmentId,
        container_id: String,
        stage: LifecycleStage,
        /// Non-zero only for the day-0 placement; transfer destinations
        /// always open empty.
        population_count: u64,
        avg_weight_g: f64,
    },
    AssignmentClosed {
        assignment_id: AssignmentId,
        container_id: String,
    },
    EnvReading {
        container_id: String,
        hour: u8,
        sensor: SensorType,
        value: f64,
    },
    Feeding {
        container_id: String,
        feed_name: String,
        hour: u8,
        amount_kg: f64,
        batch_biomass_kg: f64,
        feeding_percentage: f64,
        method: FeedingMethod,
        recorded_by: String,
    },
    FeedPurchase {
        station_id: String,
        feed_name: String,
        lot_id: String,
        amount_kg: f64,
    },
    Mortality {
        assignment_id: AssignmentId,
        container_id: String,
        count: u64,
    },
    GrowthSample {
        assignment_id: AssignmentId,
        container_id: String,
        sample_size: u64,
        avg_weight_g: f64,
        std_dev_g: f64,
    },
    LiceCount {
        container_id: String,
        adult_female: u32,
        mobile: u32,
        fish_sampled: u32,
    },
    TransferActionCompleted {
        workflow_id: String,
        action_id: String,
        source_assignment: AssignmentId,
        dest_assignment: Option<AssignmentId>,
        transferred_count: u64,
        mortality_during_transfer: u64,
        transferred_biomass_kg: f64,
    },
    WorkflowCompleted {
        workflow_id: String,
        action_count: usize,
    },
    ProjectionRunCreated {
        scenario_id: String,
        run_number: u32,
    },
}

impl SimulationEvent {
    /// Outbound topic for this event, if externally published.
    pub fn topic(&self) -> Option<Topic> {
        match self {
            SimulationEvent::Feeding { .. } => Some(Topic::Feeding),
            SimulationEvent::Mortality { .. } => Some(Topic::Mortality),
            SimulationEvent::GrowthSample { .. } => Some(Topic::GrowthSample),
            SimulationEvent::TransferActionCompleted { .. } => {
                Some(Topic::TransferActionCompleted)
            }
            SimulationEvent::WorkflowCompleted { .. } => Some(Topic::WorkflowCompleted),
            SimulationEvent::ProjectionRunCreated { .. } => Some(Topic::ProjectionRunCreated),
            _ => None,
        }
    }
}

/// The dated wrapper every event travels in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub batch_number: String,
    pub day_number: u32,
    pub date: NaiveDate,
    pub payload: SimulationEvent,
}

/// Push-style outbound publisher. Implementations must be non-blocking for
/// domain progress; a failed publish is logged by the caller and never
/// aborts the batch.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: Topic, envelope: &EventEnvelope) -> Result<(), SimError>;

    /// Bulk flush hook; the default is a no-op for unbuffered publishers.
    fn flush(&self) -> Result<(), SimError> {
        Ok(())
    }
}

/// Discards everything. The default when no subscriber is wired up.
#[derive(Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _topic: Topic, _envelope: &EventEnvelope) -> Result<(), SimError> {
        Ok(())
    }
}

/// Collects published envelopes in memory, in arrival order.
#[derive(Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<(Topic, EventEnvelope)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<(Topic, EventEnvelope)> {
        std::mem::take(&mut *self.published.lock())
    }

    pub fn count_for(&self, topic: Topic) -> usize {
        self.published
            .lock()
            .iter()
            .filter(|(t, _)| *t == topic)
            .count()
    }
}

impl EventPublisher for MemoryPublisher {
    fn publish(&self, topic: Topic, envelope: &EventEnvelope) -> Result<(), SimError> {
        self.published.lock().push((topic, envelope.clone()));
        Ok(())
    }
}
