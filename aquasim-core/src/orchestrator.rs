//! The orchestrator: plans a staggered, round-robin batch schedule, fans
//! the event engine out across a bounded worker pool, and runs the bulk
//! post-processing passes (assimilation, projections).
//!
//! Round-robin station assignment makes container contention between
//! concurrent batches structurally impossible: no two in-flight batches
//! share a station, and the 30-day stagger has early batches vacating their
//! halls before the round-robin wraps.

use crate::assimilation::{assimilate, ActualDailyAssignmentState};
use crate::directory::InfrastructureDirectory;
use crate::error::SimError;
use crate::events::{EventEnvelope, EventPublisher, NullPublisher, SimulationEvent, Topic};
use crate::inventory::FeedInventory;
use crate::ledger::AssignmentLedger;
use crate::metrics::RunSummary;
use crate::projection::ProjectionStore;
use crate::simulation::builder::SimulationBuilder;
use crate::simulation::state::{Batch, BatchRunOutcome, BatchStatus, PinnedRun};
use aquasim_schemas::feed::{Feed, FeedPolicy};
use aquasim_schemas::models::ModelSet;
use aquasim_schemas::plan::{BatchPlan, SchedulePlan};
use aquasim_schemas::stage::LifecycleStage;
use aquasim_schemas::temperature::TemperatureProfile;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub const CONTAINERS_PER_BATCH: usize = 10;
pub const DEFAULT_SATURATION: f64 = 0.85;
pub const DEFAULT_STAGGER_DAYS: u32 = 30;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Planning parameters. `batch_count_override` trims or extends the
/// saturation-derived count.
#[derive(Debug, Clone)]
pub struct PlanConfig {
    pub saturation: f64,
    pub start_date: NaiveDate,
    pub geographies: Vec<String>,
    pub species: String,
    pub initial_population: u64,
    pub duration_days: u32,
    pub stagger_days: u32,
    pub batch_count_override: Option<usize>,
}

impl PlanConfig {
    pub fn new(start_date: NaiveDate) -> Self {
        PlanConfig {
            saturation: DEFAULT_SATURATION,
            start_date,
            geographies: vec!["FO".to_string(), "SC".to_string()],
            species: "Atlantic Salmon".to_string(),
            initial_population: 3_500_000,
            duration_days: 900,
            stagger_days: DEFAULT_STAGGER_DAYS,
            batch_count_override: None,
        }
    }
}

/// Shared collaborators for one orchestrator run.
pub struct ExecutionContext {
    pub directory: Arc<InfrastructureDirectory>,
    pub ledger: Arc<AssignmentLedger>,
    pub inventory: Arc<FeedInventory>,
    pub projections: Arc<ProjectionStore>,
    pub models_by_geography: HashMap<String, ModelSet>,
    pub feeds: Vec<Feed>,
    pub feed_policy: FeedPolicy,
    pub temperature_by_geography: HashMap<String, TemperatureProfile>,
    pub publisher: Arc<dyn EventPublisher>,
}

#[derive(Debug, Clone)]
pub struct ExecuteConfig {
    pub workers: Option<usize>,
    pub batch_timeout: Duration,
    pub cancel: Arc<AtomicBool>,
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        ExecuteConfig {
            workers: None,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Everything an orchestrator run produces.
pub struct RunReport {
    pub outcomes: Vec<BatchRunOutcome>,
    pub daily_states: Vec<ActualDailyAssignmentState>,
    pub summary: RunSummary,
}

/// Derives the batch schedule: saturation-derived count, 30-day stagger,
/// and round-robin assignment over the combined station list.
pub fn plan(directory: &InfrastructureDirectory, cfg: &PlanConfig) -> Result<SchedulePlan, SimError> {
    let mut stations: Vec<(String, usize)> = Vec::new();
    for geography_id in &cfg.geographies {
        let count = directory.station_count(geography_id);
        if count == 0 {
            return Err(SimError::PlanInfeasible(format!(
                "geography '{}' has no stations",
                geography_id
            )));
        }
        for index in 0..count {
            stations.push((geography_id.clone(), index));
        }
    }

    let total_containers = directory.total_container_count();
    let derived =
        (total_containers as f64 * cfg.saturation / CONTAINERS_PER_BATCH as f64).floor() as usize;
    let batch_count = cfg.batch_count_override.unwrap_or(derived);
    if batch_count == 0 {
        return Err(SimError::PlanInfeasible(
            "saturation target yields zero batches".to_string(),
        ));
    }

    let mut sequence_by_geography: HashMap<String, u32> = HashMap::new();
    let mut batches = Vec::with_capacity(batch_count);
    for i in 0..batch_count {
        let (geography_id, station_index) = stations[i % stations.len()].clone();
        let start_date = cfg.start_date + ChronoDuration::days((i as u32 * cfg.stagger_days) as i64);
        let sequence = sequence_by_geography
            .entry(geography_id.clone())
            .and_modify(|s| *s += 1)
            .or_insert(1);
        batches.push(BatchPlan {
            batch_number: format!("{}-{}-{:03}", geography_id, start_date.year(), sequence),
            geography_id,
            species: cfg.species.clone(),
            start_date,
            initial_population: cfg.initial_population,
            duration_days: cfg.duration_days,
            station_index,
            workers_hint: None,
        });
    }

    info!(
        batches = batches.len(),
        stations = stations.len(),
        "planned batch schedule"
    );
    Ok(SchedulePlan {
        schema_version: "1.0".to_string(),
        saturation: cfg.saturation,
        stagger_days: cfg.stagger_days,
        containers_per_batch: CONTAINERS_PER_BATCH,
        batches,
    })
}

/// Persists a schedule as the on-disk YAML artifact.
pub fn save_schedule(schedule: &SchedulePlan, path: &Path) -> Result<(), SimError> {
    let yaml = serde_yaml::to_string(schedule)
        .map_err(|e| SimError::YamlParsing(path.display().to_string(), e))?;
    fs::write(path, yaml).map_err(|e| SimError::FileIO(path.display().to_string(), e))
}

pub fn load_schedule(path: &Path) -> Result<SchedulePlan, SimError> {
    let content =
        fs::read_to_string(path).map_err(|e| SimError::FileIO(path.display().to_string(), e))?;
    serde_yaml::from_str(&content).map_err(|e| SimError::YamlParsing(path.display().to_string(), e))
}

/// Executes every batch of a schedule on a bounded rayon pool, then runs
/// bulk assimilation and bulk projection computation.
pub fn execute(
    schedule: &SchedulePlan,
    ctx: &ExecutionContext,
    cfg: &ExecuteConfig,
) -> Result<RunReport, SimError> {
    let workers = cfg
        .workers
        .unwrap_or_else(|| num_cpus::get().saturating_sub(2).max(1));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| SimError::PlanInfeasible(format!("worker pool: {}", e)))?;

    info!(
        batches = schedule.batches.len(),
        workers, "starting orchestrator run"
    );
    let started = Instant::now();
    let occupancy = AtomicUsize::new(0);
    let peak_occupancy = AtomicUsize::new(0);

    let mut outcomes: Vec<BatchRunOutcome> = pool.install(|| {
        schedule
            .batches
            .par_iter()
            .map(|batch_plan| {
                let current = occupancy.fetch_add(1, Ordering::SeqCst) + 1;
                peak_occupancy.fetch_max(current, Ordering::SeqCst);
                let outcome = run_one_batch(batch_plan, ctx, cfg);
                occupancy.fetch_sub(1, Ordering::SeqCst);
                outcome
            })
            .collect()
    });

    // Bulk projections: compute a run for every engine-created scenario and
    // pin the batch to its first run.
    let mut projection_runs_computed = 0;
    for outcome in &mut outcomes {
        for scenario in &outcome.scenarios {
            // Batch numbers lead with the geography code ("FO-2025-001").
            let geography_id = scenario
                .batch_number
                .as_deref()
                .and_then(|b| b.split('-').next())
                .unwrap_or_default();
            let (Some(models), Some(profile)) = (
                ctx.models_by_geography.get(geography_id),
                ctx.temperature_by_geography.get(geography_id),
            ) else {
                warn!(scenario = %scenario.scenario_id, "no models for scenario geography");
                continue;
            };
            let run_number =
                ctx.projections
                    .run_scenario(scenario, models, profile, scenario.start_date);
            projection_runs_computed += 1;
            if outcome.batch.pinned_projection_run.is_none() {
                outcome.batch.pinned_projection_run = Some(PinnedRun {
                    scenario_id: scenario.scenario_id.clone(),
                    run_number,
                });
            }
            let envelope = EventEnvelope {
                batch_number: outcome.batch.batch_number.clone(),
                day_number: scenario.lifecycle_day_offset,
                date: scenario.start_date,
                payload: SimulationEvent::ProjectionRunCreated {
                    scenario_id: scenario.scenario_id.clone(),
                    run_number,
                },
            };
            if let Err(err) = ctx.publisher.publish(Topic::ProjectionRunCreated, &envelope) {
                warn!(error = %err, "publish failed");
            }
        }
    }

    // Bulk assimilation, parallel by batch.
    let daily_states: Vec<ActualDailyAssignmentState> = pool.install(|| {
        outcomes
            .par_iter()
            .map(|outcome| assimilate(&outcome.events))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    });

    let summary = RunSummary {
        wall_time_seconds: started.elapsed().as_secs_f64(),
        batches_completed: outcomes
            .iter()
            .filter(|o| o.batch.status != BatchStatus::Terminated)
            .count(),
        batches_failed: outcomes
            .iter()
            .filter(|o| o.batch.status == BatchStatus::Terminated)
            .count(),
        peak_worker_occupancy: peak_occupancy.load(Ordering::SeqCst),
        total_events: outcomes.iter().map(|o| o.counters.events_emitted).sum(),
        total_feed_kg: outcomes.iter().map(|o| o.counters.feed_consumed_kg).sum(),
        projection_runs_computed,
    };
    info!(
        wall_time_s = summary.wall_time_seconds,
        completed = summary.batches_completed,
        failed = summary.batches_failed,
        "orchestrator run finished"
    );

    Ok(RunReport {
        outcomes,
        daily_states,
        summary,
    })
}

/// One unit of work on the pool. A panic or a build failure terminates this
/// batch only; siblings keep running.
fn run_one_batch(
    batch_plan: &BatchPlan,
    ctx: &ExecutionContext,
    cfg: &ExecuteConfig,
) -> BatchRunOutcome {
    let Some(models) = ctx.models_by_geography.get(&batch_plan.geography_id) else {
        return failed_outcome(batch_plan, "no biology models for geography");
    };
    let Some(profile) = ctx.temperature_by_geography.get(&batch_plan.geography_id) else {
        return failed_outcome(batch_plan, "no temperature profile for geography");
    };

    let simulation = SimulationBuilder::new()
        .with_plan(batch_plan.clone())
        .with_directory(Arc::clone(&ctx.directory))
        .with_ledger(Arc::clone(&ctx.ledger))
        .with_inventory(Arc::clone(&ctx.inventory))
        .with_models(models.clone())
        .with_feeds(ctx.feeds.clone(), ctx.feed_policy.clone())
        .with_temperature(profile.clone())
        .with_publisher(Arc::clone(&ctx.publisher))
        .with_cancel_token(Arc::clone(&cfg.cancel))
        .with_deadline(Instant::now() + cfg.batch_timeout)
        .build();

    match simulation {
        Ok(simulation) => match catch_unwind(AssertUnwindSafe(|| simulation.run())) {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(batch = %batch_plan.batch_number, "batch worker panicked");
                failed_outcome(batch_plan, "worker panicked")
            }
        },
        Err(err) => {
            error!(batch = %batch_plan.batch_number, error = %err, "batch setup failed");
            failed_outcome(batch_plan, &err.to_string())
        }
    }
}

fn failed_outcome(batch_plan: &BatchPlan, reason: &str) -> BatchRunOutcome {
    BatchRunOutcome {
        batch: Batch {
            batch_number: batch_plan.batch_number.clone(),
            species: batch_plan.species.clone(),
            start_date: batch_plan.start_date,
            lifecycle_stage: LifecycleStage::EggAlevin,
            status: BatchStatus::Terminated,
            pinned_projection_run: None,
        },
        days_simulated: 0,
        counters: Default::default(),
        events: Vec::new(),
        workflows: Vec::new(),
        scenarios: Vec::new(),
        termination_reason: Some(reason.to_string()),
    }
}

/// A ready-to-use context over freshly seeded shared state, with default
/// models, feeds and profiles for the seeded geographies.
pub fn default_context(
    directory: Arc<InfrastructureDirectory>,
    publisher: Arc<dyn EventPublisher>,
) -> ExecutionContext {
    let mut models_by_geography = HashMap::new();
    let mut temperature_by_geography = HashMap::new();
    for profile in aquasim_schemas::temperature::default_profiles() {
        models_by_geography.insert(
            profile.geography_id.clone(),
            aquasim_schemas::models::default_model_set(&profile.geography_id),
        );
        temperature_by_geography.insert(profile.geography_id.clone(), profile);
    }
    ExecutionContext {
        directory,
        ledger: Arc::new(AssignmentLedger::new()),
        inventory: Arc::new(FeedInventory::new()),
        projections: Arc::new(ProjectionStore::new()),
        models_by_geography,
        feeds: aquasim_schemas::feed::default_feeds(),
        feed_policy: FeedPolicy::default(),
        temperature_by_geography,
        publisher,
    }
}

impl ExecutionContext {
    pub fn with_null_publisher(directory: Arc<InfrastructureDirectory>) -> Self {
        default_context(directory, Arc::new(NullPublisher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquasim_schemas::infrastructure::SiteLayout;

    fn planned(count: usize) -> SchedulePlan {
        let directory = InfrastructureDirectory::seed(&SiteLayout::default());
        let mut cfg = PlanConfig::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        cfg.batch_count_override = Some(count);
        plan(&directory, &cfg).unwrap()
    }

    #[test]
    fn round_robin_spreads_batches_over_distinct_stations() {
        let schedule = planned(24);
        let mut seen = std::collections::HashSet::new();
        for batch in &schedule.batches {
            assert!(
                seen.insert((batch.geography_id.clone(), batch.station_index)),
                "station reused within one round-robin cycle"
            );
        }
        // 14 Faroese + 10 Scottish stations before any wrap-around.
        assert_eq!(seen.len(), 24);
    }

    #[test]
    fn stagger_spaces_start_dates() {
        let schedule = planned(4);
        for (i, batch) in schedule.batches.iter().enumerate() {
            let expected = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
                + ChronoDuration::days((i as u32 * DEFAULT_STAGGER_DAYS) as i64);
            assert_eq!(batch.start_date, expected);
        }
    }

    #[test]
    fn saturation_derives_batch_count() {
        let directory = InfrastructureDirectory::seed(&SiteLayout::default());
        let cfg = PlanConfig::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let schedule = plan(&directory, &cfg).unwrap();
        let expected = (directory.total_container_count() as f64 * DEFAULT_SATURATION
            / CONTAINERS_PER_BATCH as f64)
            .floor() as usize;
        assert_eq!(schedule.batches.len(), expected);
    }

    #[test]
    fn batch_numbers_are_unique() {
        let schedule = planned(48);
        let mut numbers = std::collections::HashSet::new();
        for batch in &schedule.batches {
            assert!(numbers.insert(batch.batch_number.clone()));
        }
    }

    #[test]
    fn schedule_round_trips_through_yaml() {
        let schedule = planned(3);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.yaml");
        save_schedule(&schedule, &path).unwrap();
        let loaded = load_schedule(&path).unwrap();
        assert_eq!(loaded, schedule);
    }
}
