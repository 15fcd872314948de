//! Biology model records: thermal growth coefficients, feed conversion
//! ratios, and mortality rates, each keyed by `(species, geography,
//! release_period)` with optional per-stage overrides. A resolved
//! `ParametersSnapshot` freezes the full constant set for a projection run.

use crate::stage::LifecycleStage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lookup key shared by the three model kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub species: String,
    pub geography_id: String,
    pub release_period: String,
}

/// Thermal growth coefficient model. `tgc_per_thousand` is the scenario
/// default; stage overrides take precedence where present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TgcModel {
    pub model_id: String,
    pub key: ModelKey,
    pub tgc_per_thousand: f64,
    #[serde(default)]
    pub stage_overrides: BTreeMap<LifecycleStage, f64>,
}

impl TgcModel {
    pub fn tgc_for(&self, stage: LifecycleStage) -> f64 {
        self.stage_overrides
            .get(&stage)
            .copied()
            .unwrap_or(self.tgc_per_thousand)
    }
}

/// Feed conversion ratio per stage (kg feed per kg biomass gain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcrModel {
    pub model_id: String,
    pub key: ModelKey,
    pub fcr_by_stage: BTreeMap<LifecycleStage, f64>,
}

impl FcrModel {
    pub fn fcr_for(&self, stage: LifecycleStage) -> f64 {
        self.fcr_by_stage.get(&stage).copied().unwrap_or(0.0)
    }
}

/// Aggregated daily mortality rate per stage (fraction of population per day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityModel {
    pub model_id: String,
    pub key: ModelKey,
    pub daily_rate_by_stage: BTreeMap<LifecycleStage, f64>,
}

impl MortalityModel {
    pub fn daily_rate_for(&self, stage: LifecycleStage) -> f64 {
        self.daily_rate_by_stage.get(&stage).copied().unwrap_or(0.0)
    }
}

/// One TGC/FCR/mortality triple resolved for a batch or scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSet {
    pub tgc: TgcModel,
    pub fcr: FcrModel,
    pub mortality: MortalityModel,
}

/// The full model constants frozen onto a projection run at creation time.
/// Snapshots are plain per-stage tables so a stored run stays readable even
/// after the source models change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersSnapshot {
    pub tgc_model_id: String,
    pub fcr_model_id: String,
    pub mortality_model_id: String,
    pub tgc_by_stage: BTreeMap<LifecycleStage, f64>,
    pub fcr_by_stage: BTreeMap<LifecycleStage, f64>,
    pub mortality_by_stage: BTreeMap<LifecycleStage, f64>,
}

impl ParametersSnapshot {
    pub fn from_models(models: &ModelSet) -> Self {
        let mut tgc_by_stage = BTreeMap::new();
        let mut fcr_by_stage = BTreeMap::new();
        let mut mortality_by_stage = BTreeMap::new();
        for stage in LifecycleStage::ALL {
            tgc_by_stage.insert(stage, models.tgc.tgc_for(stage));
            fcr_by_stage.insert(stage, models.fcr.fcr_for(stage));
            mortality_by_stage.insert(stage, models.mortality.daily_rate_for(stage));
        }
        ParametersSnapshot {
            tgc_model_id: models.tgc.model_id.clone(),
            fcr_model_id: models.fcr.model_id.clone(),
            mortality_model_id: models.mortality.model_id.clone(),
            tgc_by_stage,
            fcr_by_stage,
            mortality_by_stage,
        }
    }

    pub fn tgc_for(&self, stage: LifecycleStage) -> f64 {
        self.tgc_by_stage.get(&stage).copied().unwrap_or(0.0)
    }

    pub fn fcr_for(&self, stage: LifecycleStage) -> f64 {
        self.fcr_by_stage.get(&stage).copied().unwrap_or(0.0)
    }

    pub fn mortality_for(&self, stage: LifecycleStage) -> f64 {
        self.mortality_by_stage.get(&stage).copied().unwrap_or(0.0)
    }
}

/// Default Atlantic salmon model set for a geography. The stage overrides
/// produce the reference growth curve: ~0.5 g at first feeding, ~9 g at
/// parr transfer, ~240 g at smoltification, and a 4.5-7.5 kg harvest weight.
pub fn default_model_set(geography_id: &str) -> ModelSet {
    let key = ModelKey {
        species: "Atlantic Salmon".to_string(),
        geography_id: geography_id.to_string(),
        release_period: "spring".to_string(),
    };
    let mut tgc_overrides = BTreeMap::new();
    tgc_overrides.insert(LifecycleStage::EggAlevin, 0.30);
    tgc_overrides.insert(LifecycleStage::Fry, 1.20);
    tgc_overrides.insert(LifecycleStage::Parr, 1.80);
    tgc_overrides.insert(LifecycleStage::Smolt, 2.00);
    tgc_overrides.insert(LifecycleStage::PostSmolt, 2.50);
    tgc_overrides.insert(LifecycleStage::Adult, 2.50);

    let mut fcr = BTreeMap::new();
    fcr.insert(LifecycleStage::EggAlevin, 0.0);
    fcr.insert(LifecycleStage::Fry, 0.90);
    fcr.insert(LifecycleStage::Parr, 1.00);
    fcr.insert(LifecycleStage::Smolt, 1.10);
    fcr.insert(LifecycleStage::PostSmolt, 1.10);
    fcr.insert(LifecycleStage::Adult, 1.25);

    let mut mortality = BTreeMap::new();
    mortality.insert(LifecycleStage::EggAlevin, 0.0015);
    mortality.insert(LifecycleStage::Fry, 0.0003);
    mortality.insert(LifecycleStage::Parr, 0.0003);
    mortality.insert(LifecycleStage::Smolt, 0.0002);
    mortality.insert(LifecycleStage::PostSmolt, 0.0001);
    mortality.insert(LifecycleStage::Adult, 0.00005);

    ModelSet {
        tgc: TgcModel {
            model_id: format!("TGC-{}-AS-SPRING", geography_id),
            key: key.clone(),
            tgc_per_thousand: 2.50,
            stage_overrides: tgc_overrides,
        },
        fcr: FcrModel {
            model_id: format!("FCR-{}-AS-SPRING", geography_id),
            key: key.clone(),
            fcr_by_stage: fcr,
        },
        mortality: MortalityModel {
            model_id: format!("MORT-{}-AS-SPRING", geography_id),
            key,
            daily_rate_by_stage: mortality,
        },
    }
}
