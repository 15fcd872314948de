//! The scenario projection engine: computes a forward daily trajectory of
//! weight, population and biomass for a scenario, and stores the result as
//! an immutable, versioned `ProjectionRun`. Re-running a scenario always
//! allocates the next run number; prior runs are never touched.

use crate::biology;
use aquasim_schemas::models::{ModelSet, ParametersSnapshot};
use aquasim_schemas::scenario::Scenario;
use aquasim_schemas::stage::LifecycleStage;
use aquasim_schemas::temperature::TemperatureProfile;
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One projected day within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioProjection {
    pub day_number: u32,
    pub projected_date: NaiveDate,
    pub population: u64,
    pub average_weight_g: f64,
    pub biomass_kg: f64,
    pub temperature_used_c: f64,
    pub stage: LifecycleStage,
}

/// An immutable execution of the projection engine against a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRun {
    pub scenario_id: String,
    pub run_number: u32,
    pub created_on: NaiveDate,
    pub parameters_snapshot: ParametersSnapshot,
    pub total_projections: u32,
    pub final_weight_g: f64,
    pub final_biomass_kg: f64,
    pub projections: Vec<ScenarioProjection>,
}

/// Computes the daily trajectory for `scenario` under `models`. Closed-form
/// biology only: no noise, so identical inputs yield identical runs.
pub fn compute_projections(
    scenario: &Scenario,
    models: &ModelSet,
    temperature: &TemperatureProfile,
) -> Vec<ScenarioProjection> {
    let snapshot = ParametersSnapshot::from_models(models);
    let mut population = scenario.initial_count;
    let mut weight_g = scenario.initial_weight_g;
    let mut projections = Vec::with_capacity(scenario.duration_days as usize);

    for day in 0..scenario.duration_days {
        let projected_date = scenario.start_date + Duration::days(day as i64);
        // Stage selection is time-based; the weight caps below are safety
        // limits, never transition triggers.
        let stage = LifecycleStage::at_day(scenario.lifecycle_day_offset + day);
        let temperature_used_c = temperature.temperature_for(projected_date, stage);

        let step = biology::grow_one_day(
            weight_g,
            snapshot.tgc_for(stage),
            temperature_used_c,
            stage.weight_cap_g(),
        );
        weight_g = step.new_weight_g;
        let deaths = biology::projected_mortality(population, snapshot.mortality_for(stage));
        population = population.saturating_sub(deaths);

        projections.push(ScenarioProjection {
            day_number: day,
            projected_date,
            population,
            average_weight_g: weight_g,
            biomass_kg: population as f64 * weight_g / 1000.0,
            temperature_used_c,
            stage,
        });
    }
    projections
}

/// Versioned store of projection runs. The per-scenario run counter is the
/// only mutable state; it is serialized behind one lock.
#[derive(Default)]
pub struct ProjectionStore {
    runs: Mutex<HashMap<String, Vec<ProjectionRun>>>,
}

impl ProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes and records a new run for `scenario`, returning its
    /// allocated run number (monotonic per scenario, starting at 1).
    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        models: &ModelSet,
        temperature: &TemperatureProfile,
        created_on: NaiveDate,
    ) -> u32 {
        let projections = compute_projections(scenario, models, temperature);
        let (final_weight_g, final_biomass_kg) = projections
            .last()
            .map(|p| (p.average_weight_g, p.biomass_kg))
            .unwrap_or((scenario.initial_weight_g, 0.0));

        let mut runs = self.runs.lock();
        let existing = runs.entry(scenario.scenario_id.clone()).or_default();
        let run_number = existing.iter().map(|r| r.run_number).max().unwrap_or(0) + 1;
        existing.push(ProjectionRun {
            scenario_id: scenario.scenario_id.clone(),
            run_number,
            created_on,
            parameters_snapshot: ParametersSnapshot::from_models(models),
            total_projections: projections.len() as u32,
            final_weight_g,
            final_biomass_kg,
            projections,
        });
        run_number
    }

    pub fn run(&self, scenario_id: &str, run_number: u32) -> Option<ProjectionRun> {
        self.runs
            .lock()
            .get(scenario_id)
            .and_then(|runs| runs.iter().find(|r| r.run_number == run_number))
            .cloned()
    }

    pub fn latest_run(&self, scenario_id: &str) -> Option<ProjectionRun> {
        self.runs
            .lock()
            .get(scenario_id)
            .and_then(|runs| runs.iter().max_by_key(|r| r.run_number))
            .cloned()
    }

    pub fn run_count(&self, scenario_id: &str) -> usize {
        self.runs
            .lock()
            .get(scenario_id)
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquasim_schemas::models::default_model_set;
    use aquasim_schemas::temperature::{default_profiles, FRESHWATER_TEMP_C};

    fn fo_profile() -> TemperatureProfile {
        default_profiles().remove(0)
    }

    fn parr_scenario() -> Scenario {
        Scenario {
            scenario_id: "SCN-TEST-1".to_string(),
            name: "test".to_string(),
            initial_count: 3_000_000,
            initial_weight_g: 9.0,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            duration_days: 720,
            lifecycle_day_offset: 180,
            tgc_model_id: "TGC-FO-AS-SPRING".to_string(),
            fcr_model_id: "FCR-FO-AS-SPRING".to_string(),
            mortality_model_id: "MORT-FO-AS-SPRING".to_string(),
            batch_number: Some("FO-2025-001".to_string()),
        }
    }

    #[test]
    fn weight_grows_and_population_shrinks_monotonically() {
        let projections =
            compute_projections(&parr_scenario(), &default_model_set("FO"), &fo_profile());
        assert_eq!(projections.len(), 720);
        for pair in projections.windows(2) {
            assert!(pair[1].average_weight_g >= pair[0].average_weight_g);
            assert!(pair[1].population <= pair[0].population);
        }
        let last = projections.last().unwrap();
        assert_eq!(last.stage, LifecycleStage::Adult);
        assert!((4_500.0..=7_500.0).contains(&last.average_weight_g));
    }

    #[test]
    fn temperature_switches_at_the_seawater_boundary() {
        let projections =
            compute_projections(&parr_scenario(), &default_model_set("FO"), &fo_profile());
        let profile = fo_profile();
        for p in &projections {
            if p.stage.is_freshwater() {
                assert_eq!(p.temperature_used_c, FRESHWATER_TEMP_C);
            } else {
                let expected = profile.sea_temperature_on(p.projected_date);
                assert!((p.temperature_used_c - expected).abs() < 1e-9);
            }
        }
        // The scenario crosses Smolt -> Post-Smolt at lifecycle day 360.
        let boundary = projections
            .iter()
            .find(|p| p.stage == LifecycleStage::PostSmolt)
            .unwrap();
        assert_ne!(boundary.temperature_used_c, FRESHWATER_TEMP_C);
    }

    #[test]
    fn rerun_allocates_next_number_and_preserves_history() {
        let store = ProjectionStore::new();
        let scenario = parr_scenario();
        let profile = fo_profile();
        let created = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        let models_v1 = default_model_set("FO");
        let first = store.run_scenario(&scenario, &models_v1, &profile, created);
        assert_eq!(first, 1);
        let run1 = store.run(&scenario.scenario_id, 1).unwrap();

        // Change the TGC model and re-run: a new version appears, run 1 is
        // byte-identical to what was stored before.
        let mut models_v2 = default_model_set("FO");
        models_v2.tgc.tgc_per_thousand = 3.2;
        models_v2
            .tgc
            .stage_overrides
            .insert(LifecycleStage::Adult, 3.2);
        let second = store.run_scenario(&scenario, &models_v2, &profile, created);
        assert_eq!(second, 2);
        assert_eq!(store.run_count(&scenario.scenario_id), 2);
        assert_eq!(store.run(&scenario.scenario_id, 1).unwrap(), run1);

        let run2 = store.run(&scenario.scenario_id, 2).unwrap();
        assert!(run2.final_weight_g > run1.final_weight_g);
        assert_eq!(
            run2.parameters_snapshot.tgc_for(LifecycleStage::Adult),
            3.2
        );
    }

    #[test]
    fn biomass_tracks_population_and_weight() {
        let projections =
            compute_projections(&parr_scenario(), &default_model_set("FO"), &fo_profile());
        for p in &projections {
            let expected = p.population as f64 * p.average_weight_g / 1000.0;
            assert!((p.biomass_kg - expected).abs() < 0.01 * expected.max(1.0));
        }
    }
}
