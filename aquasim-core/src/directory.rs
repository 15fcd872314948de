//! The infrastructure directory: an immutable, index-backed catalog of
//! geographies, stations, halls, sea areas and containers. Seeded once from
//! a `SiteLayout` and treated as read-only for the rest of the run.

use crate::error::SimError;
use aquasim_schemas::infrastructure::{
    Container, ContainerCategory, ContainerLocation, ContainerType, Geography, Hall, SeaArea,
    SiteLayout, Station,
};
use aquasim_schemas::stage::{HallRole, LifecycleStage};
use std::collections::HashMap;
use tracing::info;

pub struct InfrastructureDirectory {
    geographies: HashMap<String, Geography>,
    stations: HashMap<String, Station>,
    halls: HashMap<String, Hall>,
    areas: HashMap<String, SeaArea>,
    containers: HashMap<String, Container>,
    container_types: HashMap<String, ContainerType>,
    // Lookup indices, built once at seed time.
    station_by_geo_index: HashMap<(String, usize), String>,
    hall_by_station_role: HashMap<(String, HallRole), String>,
    containers_by_hall: HashMap<String, Vec<String>>,
    containers_by_area: HashMap<String, Vec<String>>,
    area_by_station: HashMap<String, String>,
}

impl InfrastructureDirectory {
    /// Generates the full catalog from a layout block. Ids are assembled
    /// deterministically so repeated seeds are identical.
    pub fn seed(layout: &SiteLayout) -> Self {
        let mut dir = InfrastructureDirectory {
            geographies: HashMap::new(),
            stations: HashMap::new(),
            halls: HashMap::new(),
            areas: HashMap::new(),
            containers: HashMap::new(),
            container_types: HashMap::new(),
            station_by_geo_index: HashMap::new(),
            hall_by_station_role: HashMap::new(),
            containers_by_hall: HashMap::new(),
            containers_by_area: HashMap::new(),
            area_by_station: HashMap::new(),
        };

        for (role, type_id, name, category) in [
            (HallRole::A, "CT-TRAY", "Egg & alevin tray", ContainerCategory::Tray),
            (HallRole::B, "CT-FRY", "Fry tank", ContainerCategory::Tank),
            (HallRole::C, "CT-PARR", "Parr tank", ContainerCategory::Tank),
            (HallRole::D, "CT-SMOLT", "Smolt tank", ContainerCategory::Tank),
            (HallRole::E, "CT-PSMOLT", "Post-smolt tank", ContainerCategory::Tank),
        ] {
            let spec = layout.spec_for_role(role);
            dir.container_types.insert(
                type_id.to_string(),
                ContainerType {
                    type_id: type_id.to_string(),
                    name: name.to_string(),
                    category,
                    max_biomass_kg: spec.max_biomass_kg,
                    volume_m3: spec.volume_m3,
                },
            );
        }
        dir.container_types.insert(
            "CT-RING".to_string(),
            ContainerType {
                type_id: "CT-RING".to_string(),
                name: "Sea ring".to_string(),
                category: ContainerCategory::Ring,
                max_biomass_kg: layout.ring_spec.max_biomass_kg,
                volume_m3: layout.ring_spec.volume_m3,
            },
        );

        for geo in &layout.geographies {
            dir.geographies.insert(
                geo.geography_id.clone(),
                Geography {
                    geography_id: geo.geography_id.clone(),
                    name: geo.name.clone(),
                },
            );

            for s in 0..geo.station_count {
                let station_id = format!("{}-S{:02}", geo.geography_id, s + 1);
                dir.stations.insert(
                    station_id.clone(),
                    Station {
                        station_id: station_id.clone(),
                        geography_id: geo.geography_id.clone(),
                        name: format!("{} station {}", geo.name, s + 1),
                        index: s,
                    },
                );
                dir.station_by_geo_index
                    .insert((geo.geography_id.clone(), s), station_id.clone());

                for role in [HallRole::A, HallRole::B, HallRole::C, HallRole::D, HallRole::E] {
                    let hall_id = format!("{}-{:?}", station_id, role);
                    dir.halls.insert(
                        hall_id.clone(),
                        Hall {
                            hall_id: hall_id.clone(),
                            station_id: station_id.clone(),
                            role,
                        },
                    );
                    dir.hall_by_station_role
                        .insert((station_id.clone(), role), hall_id.clone());

                    let spec = layout.spec_for_role(role);
                    let type_id = match role {
                        HallRole::A => "CT-TRAY",
                        HallRole::B => "CT-FRY",
                        HallRole::C => "CT-PARR",
                        HallRole::D => "CT-SMOLT",
                        HallRole::E => "CT-PSMOLT",
                    };
                    let mut ids = Vec::with_capacity(geo.containers_per_hall);
                    for c in 0..geo.containers_per_hall {
                        let container_id = format!("{}-{:02}", hall_id, c + 1);
                        dir.containers.insert(
                            container_id.clone(),
                            Container {
                                container_id: container_id.clone(),
                                name: format!("{} unit {}", hall_id, c + 1),
                                type_id: type_id.to_string(),
                                location: ContainerLocation::Hall {
                                    hall_id: hall_id.clone(),
                                },
                                max_biomass_kg: spec.max_biomass_kg,
                                volume_m3: spec.volume_m3,
                                active: true,
                            },
                        );
                        ids.push(container_id);
                    }
                    dir.containers_by_hall.insert(hall_id, ids);
                }

                // One sea area per station so the seawater phase keeps the
                // station partition.
                let area_id = format!("{}-A{:02}", geo.geography_id, s + 1);
                dir.areas.insert(
                    area_id.clone(),
                    SeaArea {
                        area_id: area_id.clone(),
                        geography_id: geo.geography_id.clone(),
                        name: format!("{} sea area {}", geo.name, s + 1),
                        index: s,
                    },
                );
                dir.area_by_station.insert(station_id.clone(), area_id.clone());

                let mut ring_ids = Vec::with_capacity(geo.rings_per_area);
                for r in 0..geo.rings_per_area {
                    let container_id = format!("{}-R{:02}", area_id, r + 1);
                    dir.containers.insert(
                        container_id.clone(),
                        Container {
                            container_id: container_id.clone(),
                            name: format!("{} ring {}", area_id, r + 1),
                            type_id: "CT-RING".to_string(),
                            location: ContainerLocation::Area {
                                area_id: area_id.clone(),
                            },
                            max_biomass_kg: layout.ring_spec.max_biomass_kg,
                            volume_m3: layout.ring_spec.volume_m3,
                            active: true,
                        },
                    );
                    ring_ids.push(container_id);
                }
                dir.containers_by_area.insert(area_id, ring_ids);
            }
        }

        info!(
            stations = dir.stations.len(),
            containers = dir.containers.len(),
            "seeded infrastructure directory"
        );
        dir
    }

    /// Resolves the station at `index` within a geography (round-robin key).
    pub fn resolve_station(&self, geography_id: &str, index: usize) -> Result<&Station, SimError> {
        let station_id = self
            .station_by_geo_index
            .get(&(geography_id.to_string(), index))
            .ok_or_else(|| SimError::UnknownStation {
                geography_id: geography_id.to_string(),
                index,
            })?;
        Ok(&self.stations[station_id])
    }

    /// Active containers in the station hall serving `stage`. Empty for
    /// `Adult`, which lives in sea areas.
    pub fn containers_for_stage(&self, station_id: &str, stage: LifecycleStage) -> Vec<&Container> {
        let Some(role) = stage.hall_role() else {
            return Vec::new();
        };
        let Some(hall_id) = self
            .hall_by_station_role
            .get(&(station_id.to_string(), role))
        else {
            return Vec::new();
        };
        self.list_active_containers_for_hall(hall_id)
    }

    pub fn list_active_containers_for_hall(&self, hall_id: &str) -> Vec<&Container> {
        self.containers_by_hall
            .get(hall_id)
            .map(|ids| {
                ids.iter()
                    .map(|id| &self.containers[id])
                    .filter(|c| c.active)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn sea_containers_in_area(&self, area_id: &str) -> Vec<&Container> {
        self.containers_by_area
            .get(area_id)
            .map(|ids| {
                ids.iter()
                    .map(|id| &self.containers[id])
                    .filter(|c| c.active)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The sea area paired with a freshwater station.
    pub fn sea_area_for_station(&self, station_id: &str) -> Option<&SeaArea> {
        self.area_by_station
            .get(station_id)
            .map(|area_id| &self.areas[area_id])
    }

    pub fn capacity_of(&self, container_id: &str) -> Result<f64, SimError> {
        self.containers
            .get(container_id)
            .map(|c| c.max_biomass_kg)
            .ok_or_else(|| SimError::UnknownContainer(container_id.to_string()))
    }

    pub fn container(&self, container_id: &str) -> Result<&Container, SimError> {
        self.containers
            .get(container_id)
            .ok_or_else(|| SimError::UnknownContainer(container_id.to_string()))
    }

    pub fn station(&self, station_id: &str) -> Option<&Station> {
        self.stations.get(station_id)
    }

    pub fn station_count(&self, geography_id: &str) -> usize {
        self.stations
            .values()
            .filter(|s| s.geography_id == geography_id)
            .count()
    }

    pub fn total_container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn geography(&self, geography_id: &str) -> Option<&Geography> {
        self.geographies.get(geography_id)
    }
}
