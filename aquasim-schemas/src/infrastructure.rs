//! Data structures for the physical plant: geographies, freshwater stations,
//! stage-specialized halls, sea areas, and the rearing containers inside
//! them. All of this is immutable reference data during a simulation run;
//! the `SiteLayout` block at the bottom parameterizes deterministic
//! generation of the whole catalog.

use crate::stage::HallRole;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geography {
    pub geography_id: String,
    pub name: String,
}

/// A freshwater land station. Stations are the unit of round-robin batch
/// partitioning in the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String,
    pub geography_id: String,
    pub name: String,
    /// Zero-based position within its geography, used by round-robin lookup.
    pub index: usize,
}

/// A hall within a station, specialized to one freshwater lifecycle stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hall {
    pub hall_id: String,
    pub station_id: String,
    pub role: HallRole,
}

/// A sea area hosting adult rings. Each station maps to one area in the same
/// geography, so a batch's seawater phase inherits its station partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeaArea {
    pub area_id: String,
    pub geography_id: String,
    pub name: String,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerCategory {
    Tray,
    Tank,
    Ring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerType {
    pub type_id: String,
    pub name: String,
    pub category: ContainerCategory,
    pub max_biomass_kg: f64,
    pub volume_m3: f64,
}

/// Where a container physically sits. A container belongs to exactly one of
/// {hall, sea area}.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContainerLocation {
    Hall { hall_id: String },
    Area { area_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub container_id: String,
    pub name: String,
    pub type_id: String,
    pub location: ContainerLocation,
    pub max_biomass_kg: f64,
    pub volume_m3: f64,
    pub active: bool,
}

/// Per-geography generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographyLayout {
    pub geography_id: String,
    pub name: String,
    pub station_count: usize,
    pub containers_per_hall: usize,
    pub rings_per_area: usize,
}

/// Capacity parameters for one hall role (or the sea rings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub max_biomass_kg: f64,
    pub volume_m3: f64,
}

/// The full parameter block from which the infrastructure directory is
/// seeded. Defaults describe the Faroe Islands / Scotland estate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteLayout {
    pub geographies: Vec<GeographyLayout>,
    pub tray_spec: ContainerSpec,
    pub fry_tank_spec: ContainerSpec,
    pub parr_tank_spec: ContainerSpec,
    pub smolt_tank_spec: ContainerSpec,
    pub post_smolt_tank_spec: ContainerSpec,
    pub ring_spec: ContainerSpec,
}

impl SiteLayout {
    pub fn spec_for_role(&self, role: HallRole) -> &ContainerSpec {
        match role {
            HallRole::A => &self.tray_spec,
            HallRole::B => &self.fry_tank_spec,
            HallRole::C => &self.parr_tank_spec,
            HallRole::D => &self.smolt_tank_spec,
            HallRole::E => &self.post_smolt_tank_spec,
        }
    }
}

impl Default for SiteLayout {
    fn default() -> Self {
        SiteLayout {
            geographies: vec![
                GeographyLayout {
                    geography_id: "FO".to_string(),
                    name: "Faroe Islands".to_string(),
                    station_count: 14,
                    containers_per_hall: 12,
                    rings_per_area: 12,
                },
                GeographyLayout {
                    geography_id: "SC".to_string(),
                    name: "Scotland".to_string(),
                    station_count: 10,
                    containers_per_hall: 12,
                    rings_per_area: 12,
                },
            ],
            tray_spec: ContainerSpec {
                max_biomass_kg: 250.0,
                volume_m3: 2.0,
            },
            fry_tank_spec: ContainerSpec {
                max_biomass_kg: 6_000.0,
                volume_m3: 80.0,
            },
            parr_tank_spec: ContainerSpec {
                max_biomass_kg: 30_000.0,
                volume_m3: 300.0,
            },
            smolt_tank_spec: ContainerSpec {
                max_biomass_kg: 90_000.0,
                volume_m3: 800.0,
            },
            post_smolt_tank_spec: ContainerSpec {
                max_biomass_kg: 220_000.0,
                volume_m3: 1_800.0,
            },
            ring_spec: ContainerSpec {
                max_biomass_kg: 2_400_000.0,
                volume_m3: 40_000.0,
            },
        }
    }
}
