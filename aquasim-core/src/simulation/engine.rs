use crate::biology;
use crate::directory::InfrastructureDirectory;
use crate::error::SimError;
use crate::events::{
    EventEnvelope, EventPublisher, FeedingMethod, SensorType, SimulationEvent,
};
use crate::inventory::FeedInventory;
use crate::ledger::{Assignment, AssignmentId, AssignmentLedger, OpenRequest};
use crate::simulation::state::{Batch, BatchRunOutcome, BatchState, BatchStatus};
use crate::transfer::{PlannedMove, TransferConditions, TransferMethod, TransferWorkflow};
use aquasim_schemas::feed::{Feed, FeedPolicy};
use aquasim_schemas::infrastructure::Container;
use aquasim_schemas::models::ModelSet;
use aquasim_schemas::plan::BatchPlan;
use aquasim_schemas::scenario::Scenario;
use aquasim_schemas::stage::LifecycleStage;
use aquasim_schemas::temperature::TemperatureProfile;
use chrono::Duration;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Containers a batch occupies per stage.
pub const CONTAINERS_PER_BATCH: usize = 10;

/// Weight of a fertilized egg at placement.
const EGG_WEIGHT_G: f64 = 0.1;

/// Handling losses during a container move.
const TRANSFER_MORTALITY_RATE: f64 = 0.0005;

/// Hours at which environmental readings are taken.
const READING_HOURS: [u8; 6] = [2, 6, 10, 14, 18, 22];

/// Feedings are split across a morning and an afternoon slot.
const FEEDING_HOURS: [u8; 2] = [8, 15];

const GROWTH_SAMPLE_INTERVAL_DAYS: u32 = 7;
const GROWTH_SAMPLE_SIZE: u64 = 30;

/// Day-stepped simulator for one batch. Strictly sequential and
/// deterministic: every random draw is seeded from
/// `(batch_number, day, event kind)`.
pub struct BatchSimulation {
    plan: BatchPlan,
    directory: Arc<InfrastructureDirectory>,
    ledger: Arc<AssignmentLedger>,
    inventory: Arc<FeedInventory>,
    models: ModelSet,
    feeds: HashMap<String, Feed>,
    feed_policy: FeedPolicy,
    temperature: TemperatureProfile,
    publisher: Arc<dyn EventPublisher>,
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
    state: BatchState,
}

enum DayOutcome {
    Continue,
    BatchCompleted,
}

impl BatchSimulation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        plan: BatchPlan,
        directory: Arc<InfrastructureDirectory>,
        ledger: Arc<AssignmentLedger>,
        inventory: Arc<FeedInventory>,
        models: ModelSet,
        feeds: HashMap<String, Feed>,
        feed_policy: FeedPolicy,
        temperature: TemperatureProfile,
        publisher: Arc<dyn EventPublisher>,
        cancel: Arc<AtomicBool>,
        deadline: Option<Instant>,
    ) -> Result<Self, SimError> {
        let station = directory
            .resolve_station(&plan.geography_id, plan.station_index)?
            .station_id
            .clone();
        let state = BatchState {
            batch: Batch {
                batch_number: plan.batch_number.clone(),
                species: plan.species.clone(),
                start_date: plan.start_date,
                lifecycle_stage: LifecycleStage::EggAlevin,
                status: BatchStatus::Active,
                pinned_projection_run: None,
            },
            day: 0,
            date: plan.start_date,
            station_id: station,
            events: Vec::new(),
            workflows: Vec::new(),
            scenarios: Vec::new(),
            counters: Default::default(),
        };
        Ok(BatchSimulation {
            plan,
            directory,
            ledger,
            inventory,
            models,
            feeds,
            feed_policy,
            temperature,
            publisher,
            cancel,
            deadline,
            state,
        })
    }

    /// Runs the batch to completion, cancellation, or failure. Domain
    /// failures terminate the batch in place and are reported through the
    /// outcome rather than as `Err`, so one bad batch never aborts its
    /// siblings.
    pub fn run(mut self) -> BatchRunOutcome {
        info!(
            batch = %self.plan.batch_number,
            station = %self.state.station_id,
            "starting batch simulation"
        );
        let mut termination_reason = None;

        if let Err(err) = self.place_initial() {
            termination_reason = Some(err.to_string());
            self.terminate(&err.to_string());
            return self.into_outcome(termination_reason);
        }

        for day in 1..=self.plan.duration_days {
            if self.cancel_requested() {
                termination_reason = Some("cancelled".to_string());
                self.terminate("cancelled");
                break;
            }
            match self.step(day) {
                Ok(DayOutcome::Continue) => {}
                Ok(DayOutcome::BatchCompleted) => break,
                Err(err) => {
                    warn!(batch = %self.plan.batch_number, day, error = %err, "batch failed");
                    termination_reason = Some(err.to_string());
                    self.terminate(&err.to_string());
                    break;
                }
            }
        }
        self.into_outcome(termination_reason)
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Day 0: the one place where assignments open pre-populated. Eggs are
    /// split evenly across ten trays in the station's A hall; there is no
    /// transfer involved.
    fn place_initial(&mut self) -> Result<(), SimError> {
        let containers = self.free_containers_for(LifecycleStage::EggAlevin)?;
        let per_container = self.plan.initial_population / CONTAINERS_PER_BATCH as u64;
        let mut remainder = self.plan.initial_population % CONTAINERS_PER_BATCH as u64;

        for container in containers.iter().take(CONTAINERS_PER_BATCH) {
            let extra = if remainder > 0 { 1 } else { 0 };
            remainder = remainder.saturating_sub(1);
            let population = per_container + extra;
            let id = self.ledger.open(OpenRequest {
                batch_number: &self.plan.batch_number,
                container,
                stage: LifecycleStage::EggAlevin,
                date: self.state.date,
                population_count: population,
                avg_weight_g: EGG_WEIGHT_G,
                allow_mixed: false,
            })?;
            self.emit(SimulationEvent::AssignmentOpened {
                assignment_id: id,
                container_id: container.container_id.clone(),
                stage: LifecycleStage::EggAlevin,
                population_count: population,
                avg_weight_g: EGG_WEIGHT_G,
            });
        }
        Ok(())
    }

    fn step(&mut self, day: u32) -> Result<DayOutcome, SimError> {
        self.state.day = day;
        self.state.date = self.plan.start_date + Duration::days(day as i64);
        let stage = self.state.batch.lifecycle_stage;
        let transition_due = day == stage.cumulative_end_day();

        let assignments = self.active_assignments();
        if assignments.is_empty() {
            return Err(SimError::InvariantFailed {
                batch_number: self.plan.batch_number.clone(),
                day_number: day,
                reason: "no active assignments".to_string(),
            });
        }

        self.emit_environmental_readings(&assignments, stage);
        let growth = self.growth_step(&assignments, stage)?;

        // Mortality and feeding are deferred past a transition day; the new
        // stage picks them up the next morning.
        if !transition_due {
            self.mortality_step(&assignments, stage)?;
            self.feeding_step(stage, &growth)?;
        }

        if day % GROWTH_SAMPLE_INTERVAL_DAYS == 0 {
            self.growth_sample_step();
            if stage == LifecycleStage::Adult {
                self.lice_count_step();
            }
        }

        if transition_due {
            if stage == LifecycleStage::Adult {
                self.close_all_active();
                self.state.batch.status = BatchStatus::Completed;
                info!(batch = %self.plan.batch_number, day, "batch completed");
                return Ok(DayOutcome::BatchCompleted);
            }
            self.transfer_to_next_stage(stage)?;
            if self.state.batch.lifecycle_stage == LifecycleStage::Parr {
                self.create_from_batch_scenario();
            }
        }
        Ok(DayOutcome::Continue)
    }

    fn active_assignments(&self) -> Vec<Assignment> {
        self.ledger
            .active_assignments_for_batch(&self.plan.batch_number)
    }

    fn emit_environmental_readings(&mut self, assignments: &[Assignment], stage: LifecycleStage) {
        let freshwater = stage.is_freshwater();
        let water_temp = self.temperature.temperature_for(self.state.date, stage);
        for assignment in assignments {
            let kind = format!("env:{}", assignment.container_id);
            let mut rng = biology::event_rng(&self.plan.batch_number, self.state.day, &kind);
            for hour in READING_HOURS {
                for sensor in SensorType::ALL {
                    let value = match sensor {
                        SensorType::WaterTemperature => water_temp + rng.gen_range(-0.3..=0.3),
                        SensorType::DissolvedOxygen => 9.5 + rng.gen_range(-1.0..=1.0),
                        SensorType::Ph => {
                            let base = if freshwater { 6.8 } else { 8.0 };
                            base + rng.gen_range(-0.2..=0.2)
                        }
                        SensorType::Salinity => {
                            let base = if freshwater { 0.2 } else { 34.5 };
                            base + rng.gen_range(-0.1..=0.1)
                        }
                        SensorType::Co2 => 3.0 + rng.gen_range(-1.0..=1.0),
                        SensorType::Ammonia => 0.1 + rng.gen_range(-0.05..=0.05),
                        SensorType::Turbidity => (2.0f64 + rng.gen_range(-1.5..=1.5)).max(0.0),
                    };
                    self.emit(SimulationEvent::EnvReading {
                        container_id: assignment.container_id.clone(),
                        hour,
                        sensor,
                        value,
                    });
                }
            }
        }
    }

    /// Applies one day of TGC growth to every active assignment and returns
    /// the per-assignment steps for the feeding computation.
    fn growth_step(
        &mut self,
        assignments: &[Assignment],
        stage: LifecycleStage,
    ) -> Result<HashMap<AssignmentId, biology::GrowthStep>, SimError> {
        let temperature = self.temperature.temperature_for(self.state.date, stage);
        let tgc = self.models.tgc.tgc_for(stage);
        let cap = stage.weight_cap_g();
        let mut steps = HashMap::with_capacity(assignments.len());
        for assignment in assignments {
            let step = biology::grow_one_day(assignment.avg_weight_g, tgc, temperature, cap);
            self.ledger.update_weight(assignment.id, step.new_weight_g)?;
            steps.insert(assignment.id, step);
        }
        Ok(steps)
    }

    fn mortality_step(
        &mut self,
        assignments: &[Assignment],
        stage: LifecycleStage,
    ) -> Result<(), SimError> {
        let rate = self.models.mortality.daily_rate_for(stage);
        for assignment in assignments {
            let seed = biology::event_seed(
                &self.plan.batch_number,
                self.state.day,
                &format!("mortality:{}", assignment.container_id),
            );
            let draw = biology::mortality_for_day(assignment.population_count, rate, seed);
            if draw.deaths == 0 {
                continue;
            }
            self.ledger
                .record_mortality(assignment.id, draw.deaths, self.state.date)?;
            self.state.counters.mortality_total += draw.deaths;
            self.emit(SimulationEvent::Mortality {
                assignment_id: assignment.id,
                container_id: assignment.container_id.clone(),
                count: draw.deaths,
            });
            let after = self.ledger.get(assignment.id)?;
            if !after.is_active {
                self.emit(SimulationEvent::AssignmentClosed {
                    assignment_id: assignment.id,
                    container_id: assignment.container_id.clone(),
                });
            }
        }
        Ok(())
    }

    fn feeding_step(
        &mut self,
        stage: LifecycleStage,
        growth: &HashMap<AssignmentId, biology::GrowthStep>,
    ) -> Result<(), SimError> {
        let Some(feed_name) = self.feed_policy.feed_name_for(stage) else {
            return Ok(()); // egg & alevin do not feed
        };
        let feed = self
            .feeds
            .get(feed_name)
            .ok_or_else(|| SimError::UnknownFeedName {
                stage,
                feed_name: feed_name.to_string(),
            })?
            .clone();
        let fcr = self.models.fcr.fcr_for(stage);

        // Re-read populations so the day's mortality is already reflected.
        for assignment in self.active_assignments() {
            let Some(step) = growth.get(&assignment.id) else {
                continue;
            };
            let demand = biology::feed_demand(assignment.population_count, step, fcr);
            if demand.feed_kg <= 0.0 {
                continue;
            }
            let draw = self.inventory.consume(
                &self.state.station_id,
                &feed,
                demand.feed_kg,
                self.state.date,
            )?;
            for purchase in draw.purchases {
                self.emit(SimulationEvent::FeedPurchase {
                    station_id: purchase.station_id,
                    feed_name: purchase.feed_name,
                    lot_id: purchase.lot_id,
                    amount_kg: purchase.amount_kg,
                });
            }
            self.state.counters.feed_consumed_kg += demand.feed_kg;

            let biomass = assignment.biomass_kg;
            let per_feeding = demand.feed_kg / FEEDING_HOURS.len() as f64;
            for hour in FEEDING_HOURS {
                let percentage = if biomass > 0.0 {
                    per_feeding / biomass * 100.0
                } else {
                    0.0
                };
                self.emit(SimulationEvent::Feeding {
                    container_id: assignment.container_id.clone(),
                    feed_name: feed.name.clone(),
                    hour,
                    amount_kg: per_feeding,
                    batch_biomass_kg: biomass,
                    feeding_percentage: percentage,
                    method: FeedingMethod::AutoFeeder,
                    recorded_by: "auto-feeder".to_string(),
                });
            }
        }
        Ok(())
    }

    fn growth_sample_step(&mut self) {
        for assignment in self.active_assignments() {
            let kind = format!("growth_sample:{}", assignment.container_id);
            let mut rng = biology::event_rng(&self.plan.batch_number, self.state.day, &kind);
            let sample_size = GROWTH_SAMPLE_SIZE.min(assignment.population_count);
            if sample_size == 0 {
                continue;
            }
            let measured = assignment.avg_weight_g * (1.0 + rng.gen_range(-0.02..=0.02));
            self.emit(SimulationEvent::GrowthSample {
                assignment_id: assignment.id,
                container_id: assignment.container_id.clone(),
                sample_size,
                avg_weight_g: measured,
                std_dev_g: measured * 0.08,
            });
        }
    }

    fn lice_count_step(&mut self) {
        for assignment in self.active_assignments() {
            let kind = format!("lice:{}", assignment.container_id);
            let mut rng = biology::event_rng(&self.plan.batch_number, self.state.day, &kind);
            self.emit(SimulationEvent::LiceCount {
                container_id: assignment.container_id.clone(),
                adult_female: rng.gen_range(0..=12),
                mobile: rng.gen_range(0..=30),
                fish_sampled: 20,
            });
        }
    }

    /// Moves every source container's population into a fresh container of
    /// the next stage's hall (or sea area). Destinations open with zero
    /// population; the paired transfer actions are the only population path.
    fn transfer_to_next_stage(&mut self, stage: LifecycleStage) -> Result<(), SimError> {
        let next_stage = stage.next().expect("adult handled by caller");
        let sources = self.active_assignments();
        let mut candidates = self.free_containers_for(next_stage)?;
        if candidates.len() < sources.len() {
            return Err(SimError::PlanInfeasible(format!(
                "{} free containers for {} sources moving to {:?}",
                candidates.len(),
                sources.len(),
                next_stage
            )));
        }

        let workflow_id = format!("TW-{}-{:02}", self.plan.batch_number, next_stage.order());
        // The first `sources.len()` candidates are the destinations; the
        // tail is kept as alternates for the single retry.
        let mut attempt = 0;
        let mut workflow = loop {
            let moves: Vec<PlannedMove<'_>> = sources
                .iter()
                .zip(candidates.iter())
                .map(|(source, dest)| PlannedMove {
                    source_assignment: source.id,
                    destination: dest,
                    count: source.population_count,
                    avg_weight_g: source.avg_weight_g,
                    allow_mixed: false,
                })
                .collect();
            let wf_id = if attempt == 0 {
                workflow_id.clone()
            } else {
                format!("{}-R1", workflow_id)
            };
            let mut workflow = TransferWorkflow::plan(
                &wf_id,
                &self.plan.batch_number,
                next_stage,
                self.state.date,
                &moves,
            );
            match workflow.finalize(&self.ledger, &moves, self.state.date) {
                Ok(()) => break workflow,
                Err(err) => {
                    // One retry with an alternate destination where the
                    // directory offers one; otherwise the failure aborts
                    // the batch.
                    let retryable = err.is_recoverable()
                        || matches!(err, SimError::CapacityExceeded { .. });
                    if attempt >= 1 || !retryable || candidates.len() <= sources.len() {
                        return Err(err);
                    }
                    // Release any destinations the failed attempt opened.
                    for action in &workflow.actions {
                        if let Some(dest) = action.dest_assignment {
                            self.ledger.close(dest, self.state.date)?;
                        }
                    }
                    let failed = workflow
                        .actions
                        .iter()
                        .position(|a| a.failure_reason.is_some())
                        .unwrap_or(0);
                    let replacement = candidates.pop().expect("alternate checked above");
                    warn!(
                        batch = %self.plan.batch_number,
                        day = self.state.day,
                        container = %candidates[failed].container_id,
                        "destination rejected, retrying with alternate"
                    );
                    candidates[failed] = replacement;
                    attempt += 1;
                }
            }
        };

        for action in &workflow.actions {
            if let Some(dest) = action.dest_assignment {
                let opened = self.ledger.get(dest)?;
                self.emit(SimulationEvent::AssignmentOpened {
                    assignment_id: dest,
                    container_id: opened.container_id,
                    stage: next_stage,
                    population_count: 0,
                    avg_weight_g: 0.0,
                });
            }
        }

        // Sea entries go by wellboat; moves between freshwater halls by pump.
        let method = if next_stage == LifecycleStage::Adult {
            TransferMethod::Wellboat
        } else {
            TransferMethod::Pump
        };
        let mut env_rng =
            biology::event_rng(&self.plan.batch_number, self.state.day, "transfer_env");
        let conditions = TransferConditions {
            water_temp_c: self.temperature.temperature_for(self.state.date, next_stage),
            dissolved_oxygen_mg_l: 9.5 + env_rng.gen_range(-1.0..=1.0),
        };

        for index in 0..workflow.actions.len() {
            let planned = workflow.actions[index].planned_count;
            let handling_losses = (planned as f64 * TRANSFER_MORTALITY_RATE).round() as u64;
            workflow.execute_action(
                index,
                &self.ledger,
                handling_losses,
                method,
                conditions,
                self.state.date,
            )?;
            let action = workflow.actions[index].clone();
            self.state.counters.transfers_executed += 1;
            let source = self.ledger.get(action.source_assignment)?;
            self.emit(SimulationEvent::TransferActionCompleted {
                workflow_id: workflow.workflow_id.clone(),
                action_id: action.action_id.clone(),
                source_assignment: action.source_assignment,
                dest_assignment: action.dest_assignment,
                transferred_count: action.transferred_count,
                mortality_during_transfer: action.mortality_during_transfer,
                transferred_biomass_kg: action.transferred_biomass_kg,
            });
            if !source.is_active {
                self.emit(SimulationEvent::AssignmentClosed {
                    assignment_id: source.id,
                    container_id: source.container_id,
                });
            }
        }

        self.emit(SimulationEvent::WorkflowCompleted {
            workflow_id: workflow.workflow_id.clone(),
            action_count: workflow.actions.len(),
        });
        info!(
            batch = %self.plan.batch_number,
            day = self.state.day,
            from = stage.display_name(),
            to = next_stage.display_name(),
            "stage transition complete"
        );
        self.state.workflows.push(workflow);
        self.state.batch.lifecycle_stage = next_stage;
        Ok(())
    }

    /// Free, active containers serving a stage at this batch's station (or
    /// its paired sea area for `Adult`).
    fn free_containers_for(&self, stage: LifecycleStage) -> Result<Vec<Container>, SimError> {
        let containers = if stage == LifecycleStage::Adult {
            let area = self
                .directory
                .sea_area_for_station(&self.state.station_id)
                .ok_or_else(|| {
                    SimError::PlanInfeasible(format!(
                        "station {} has no sea area",
                        self.state.station_id
                    ))
                })?;
            self.directory.sea_containers_in_area(&area.area_id)
        } else {
            self.directory
                .containers_for_stage(&self.state.station_id, stage)
        };
        let free: Vec<_> = containers
            .into_iter()
            .filter(|c| self.ledger.active_interval(&c.container_id).is_empty())
            .cloned()
            .collect();
        if free.len() < CONTAINERS_PER_BATCH {
            return Err(SimError::PlanInfeasible(format!(
                "only {} free containers for stage {:?} at {}",
                free.len(),
                stage,
                self.state.station_id
            )));
        }
        Ok(free)
    }

    /// The from-batch scenario created on entering the parr stage.
    fn create_from_batch_scenario(&mut self) {
        let active = self.active_assignments();
        let initial_count: u64 = active.iter().map(|a| a.population_count).sum();
        if initial_count == 0 {
            return;
        }
        let biomass: f64 = active.iter().map(|a| a.biomass_kg).sum();
        let initial_weight_g = biomass * 1000.0 / initial_count as f64;
        let scenario = Scenario {
            scenario_id: format!("SCN-{}-D{}", self.plan.batch_number, self.state.day),
            name: format!("From-batch projection {}", self.plan.batch_number),
            initial_count,
            initial_weight_g,
            start_date: self.state.date,
            duration_days: self.plan.duration_days.saturating_sub(self.state.day),
            lifecycle_day_offset: self.state.day,
            tgc_model_id: self.models.tgc.model_id.clone(),
            fcr_model_id: self.models.fcr.model_id.clone(),
            mortality_model_id: self.models.mortality.model_id.clone(),
            batch_number: Some(self.plan.batch_number.clone()),
        };
        info!(
            batch = %self.plan.batch_number,
            scenario = %scenario.scenario_id,
            initial_count,
            "created from-batch scenario"
        );
        self.state.scenarios.push(scenario);
    }

    fn close_all_active(&mut self) {
        for assignment in self.active_assignments() {
            if self.ledger.close(assignment.id, self.state.date).is_ok() {
                self.emit(SimulationEvent::AssignmentClosed {
                    assignment_id: assignment.id,
                    container_id: assignment.container_id.clone(),
                });
            }
        }
    }

    fn terminate(&mut self, reason: &str) {
        self.close_all_active();
        self.state.batch.status = BatchStatus::Terminated;
        warn!(batch = %self.plan.batch_number, reason, "batch terminated");
    }

    fn emit(&mut self, payload: SimulationEvent) {
        let envelope = EventEnvelope {
            batch_number: self.plan.batch_number.clone(),
            day_number: self.state.day,
            date: self.state.date,
            payload,
        };
        if let Some(topic) = envelope.payload.topic() {
            // Publisher failures must never block domain progress.
            if let Err(err) = self.publisher.publish(topic, &envelope) {
                warn!(batch = %self.plan.batch_number, error = %err, "publish failed");
            }
        }
        self.state.counters.events_emitted += 1;
        self.state.events.push(envelope);
    }

    fn into_outcome(self, termination_reason: Option<String>) -> BatchRunOutcome {
        let _ = self.publisher.flush();
        BatchRunOutcome {
            batch: self.state.batch,
            days_simulated: self.state.day,
            counters: self.state.counters,
            events: self.state.events,
            workflows: self.state.workflows,
            scenarios: self.state.scenarios,
            termination_reason,
        }
    }
}
