use crate::directory::InfrastructureDirectory;
use crate::error::SimError;
use crate::events::{EventPublisher, NullPublisher};
use crate::inventory::FeedInventory;
use crate::ledger::AssignmentLedger;
use crate::simulation::engine::BatchSimulation;
use aquasim_schemas::feed::{Feed, FeedPolicy};
use aquasim_schemas::models::ModelSet;
use aquasim_schemas::plan::BatchPlan;
use aquasim_schemas::temperature::TemperatureProfile;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// A fluent builder for constructing a `BatchSimulation`.
///
/// The directory, ledger and inventory are shared across concurrently
/// running batches; models, feeds and the temperature profile are resolved
/// per geography before building.
#[derive(Default)]
pub struct SimulationBuilder {
    plan: Option<BatchPlan>,
    directory: Option<Arc<InfrastructureDirectory>>,
    ledger: Option<Arc<AssignmentLedger>>,
    inventory: Option<Arc<FeedInventory>>,
    models: Option<ModelSet>,
    feeds: Vec<Feed>,
    feed_policy: FeedPolicy,
    temperature: Option<TemperatureProfile>,
    publisher: Option<Arc<dyn EventPublisher>>,
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, plan: BatchPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_directory(mut self, directory: Arc<InfrastructureDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<AssignmentLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_inventory(mut self, inventory: Arc<FeedInventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn with_models(mut self, models: ModelSet) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_feeds(mut self, feeds: Vec<Feed>, policy: FeedPolicy) -> Self {
        self.feeds = feeds;
        self.feed_policy = policy;
        self
    }

    pub fn with_temperature(mut self, profile: TemperatureProfile) -> Self {
        self.temperature = Some(profile);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Cooperative cancel token, checked at day boundaries.
    pub fn with_cancel_token(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Wall-clock deadline converted to a cancel at the next day boundary.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Consumes the builder and returns a fully configured `BatchSimulation`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::PlanInfeasible` when a required collaborator is
    /// missing, and `NoTemperatureProfile`/`NoPolicyFound` when the resolved
    /// inputs do not cover the plan's geography.
    pub fn build(self) -> Result<BatchSimulation, SimError> {
        let plan = self
            .plan
            .ok_or_else(|| SimError::PlanInfeasible("no batch plan provided".to_string()))?;
        let directory = self
            .directory
            .ok_or_else(|| SimError::PlanInfeasible("no infrastructure directory".to_string()))?;
        let ledger = self
            .ledger
            .ok_or_else(|| SimError::PlanInfeasible("no assignment ledger".to_string()))?;
        let inventory = self.inventory.unwrap_or_else(|| Arc::new(FeedInventory::new()));
        let models = self.models.ok_or_else(|| SimError::NoPolicyFound {
            kind: "biology".to_string(),
            species: plan.species.clone(),
            geography_id: plan.geography_id.clone(),
        })?;
        let temperature = self
            .temperature
            .ok_or_else(|| SimError::NoTemperatureProfile {
                geography_id: plan.geography_id.clone(),
            })?;
        if temperature.geography_id != plan.geography_id {
            return Err(SimError::NoTemperatureProfile {
                geography_id: plan.geography_id.clone(),
            });
        }
        let publisher = self.publisher.unwrap_or_else(|| Arc::new(NullPublisher));
        let feeds: HashMap<String, Feed> = self
            .feeds
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();

        BatchSimulation::new(
            plan,
            directory,
            ledger,
            inventory,
            models,
            feeds,
            self.feed_policy,
            temperature,
            publisher,
            self.cancel.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
            self.deadline,
        )
    }
}
