//! The assignment ledger: the authoritative store of batch-in-container
//! records. Every mutation runs atomically behind one lock acquisition, so
//! concurrent batch workers observe serializable per-container state.
//!
//! Population flows through the ledger in exactly two ways: the day-0
//! placement opens pre-populated assignments, and every later movement is a
//! transfer-action credit against a zero-initialized destination.

use crate::error::SimError;
use aquasim_schemas::infrastructure::Container;
use aquasim_schemas::stage::LifecycleStage;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub type AssignmentId = u64;

/// One batch-in-container record with its temporal bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub batch_number: String,
    pub container_id: String,
    pub lifecycle_stage: LifecycleStage,
    pub assignment_date: NaiveDate,
    pub departure_date: Option<NaiveDate>,
    pub population_count: u64,
    pub avg_weight_g: f64,
    pub biomass_kg: f64,
    pub is_active: bool,
}

impl Assignment {
    fn recompute_biomass(&mut self) {
        self.biomass_kg = self.population_count as f64 * self.avg_weight_g / 1000.0;
    }

    fn close(&mut self, date: NaiveDate) {
        self.is_active = false;
        self.departure_date = Some(date);
    }
}

#[derive(Default)]
struct LedgerInner {
    next_id: AssignmentId,
    assignments: HashMap<AssignmentId, Assignment>,
    active_by_container: HashMap<String, Vec<AssignmentId>>,
}

/// Serializing store for assignments. Cheap to share across batch workers.
#[derive(Default)]
pub struct AssignmentLedger {
    inner: RwLock<LedgerInner>,
}

/// Parameters for `AssignmentLedger::open`.
pub struct OpenRequest<'a> {
    pub batch_number: &'a str,
    pub container: &'a Container,
    pub stage: LifecycleStage,
    pub date: NaiveDate,
    pub population_count: u64,
    pub avg_weight_g: f64,
    /// Permit a second batch in an occupied container. Per-call, never
    /// workflow-global.
    pub allow_mixed: bool,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an assignment. Fails with `CapacityExceeded` when the declared
    /// population would overload the container and with `ContainerBusy`
    /// when a different batch is active there (unless `allow_mixed`).
    pub fn open(&self, req: OpenRequest<'_>) -> Result<AssignmentId, SimError> {
        let biomass_kg = req.population_count as f64 * req.avg_weight_g / 1000.0;
        if biomass_kg > req.container.max_biomass_kg {
            return Err(SimError::CapacityExceeded {
                batch_number: req.batch_number.to_string(),
                container_id: req.container.container_id.clone(),
                biomass_kg,
                max_biomass_kg: req.container.max_biomass_kg,
            });
        }

        let mut inner = self.inner.write();
        if let Some(active) = inner.active_by_container.get(&req.container.container_id) {
            for id in active {
                let existing = &inner.assignments[id];
                if existing.batch_number == req.batch_number {
                    return Err(SimError::InvariantFailed {
                        batch_number: req.batch_number.to_string(),
                        day_number: 0,
                        reason: format!(
                            "overlapping active assignment {} in container '{}'",
                            id, req.container.container_id
                        ),
                    });
                }
                if !req.allow_mixed {
                    return Err(SimError::ContainerBusy {
                        batch_number: req.batch_number.to_string(),
                        container_id: req.container.container_id.clone(),
                        occupant: existing.batch_number.clone(),
                    });
                }
            }
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let mut assignment = Assignment {
            id,
            batch_number: req.batch_number.to_string(),
            container_id: req.container.container_id.clone(),
            lifecycle_stage: req.stage,
            assignment_date: req.date,
            departure_date: None,
            population_count: req.population_count,
            avg_weight_g: req.avg_weight_g,
            biomass_kg: 0.0,
            is_active: true,
        };
        assignment.recompute_biomass();
        debug!(
            batch = req.batch_number,
            container = %req.container.container_id,
            population = req.population_count,
            "opened assignment"
        );
        inner
            .active_by_container
            .entry(req.container.container_id.clone())
            .or_default()
            .push(id);
        inner.assignments.insert(id, assignment);
        Ok(id)
    }

    /// Increases population from a completed transfer action. The caller
    /// supplies the moved biomass; the average weight is recomputed from the
    /// blended totals.
    pub fn credit(
        &self,
        id: AssignmentId,
        count: u64,
        biomass_kg: f64,
    ) -> Result<(), SimError> {
        let mut inner = self.inner.write();
        let assignment = Self::active_mut(&mut inner, id)?;
        assignment.population_count += count;
        assignment.biomass_kg += biomass_kg;
        if assignment.population_count > 0 {
            assignment.avg_weight_g =
                assignment.biomass_kg * 1000.0 / assignment.population_count as f64;
        }
        Ok(())
    }

    /// Decreases population; reaching zero closes the assignment.
    pub fn debit(&self, id: AssignmentId, count: u64, date: NaiveDate) -> Result<(), SimError> {
        let mut inner = self.inner.write();
        let assignment = Self::active_mut(&mut inner, id)?;
        if count > assignment.population_count {
            let (batch, have) = (assignment.batch_number.clone(), assignment.population_count);
            return Err(SimError::InvariantFailed {
                batch_number: batch,
                day_number: 0,
                reason: format!("debit of {} exceeds population {}", count, have),
            });
        }
        assignment.population_count -= count;
        assignment.recompute_biomass();
        if assignment.population_count == 0 {
            assignment.close(date);
            let container_id = assignment.container_id.clone();
            Self::drop_active(&mut inner, &container_id, id);
        }
        Ok(())
    }

    /// Mortality is a debit with its own audit trail at the event layer.
    pub fn record_mortality(
        &self,
        id: AssignmentId,
        count: u64,
        date: NaiveDate,
    ) -> Result<(), SimError> {
        self.debit(id, count, date)
    }

    /// Updates the average weight after a growth step.
    pub fn update_weight(&self, id: AssignmentId, avg_weight_g: f64) -> Result<(), SimError> {
        let mut inner = self.inner.write();
        let assignment = Self::active_mut(&mut inner, id)?;
        assignment.avg_weight_g = avg_weight_g;
        assignment.recompute_biomass();
        Ok(())
    }

    /// Hard-close even with a non-zero population (stage completion,
    /// cancellation).
    pub fn close(&self, id: AssignmentId, date: NaiveDate) -> Result<(), SimError> {
        let mut inner = self.inner.write();
        let assignment = inner
            .assignments
            .get_mut(&id)
            .ok_or(SimError::UnknownAssignment(id))?;
        if !assignment.is_active {
            return Ok(());
        }
        if date < assignment.assignment_date {
            let batch = assignment.batch_number.clone();
            return Err(SimError::InvariantFailed {
                batch_number: batch,
                day_number: 0,
                reason: format!("departure {} precedes assignment date", date),
            });
        }
        assignment.close(date);
        let container_id = assignment.container_id.clone();
        Self::drop_active(&mut inner, &container_id, id);
        Ok(())
    }

    /// Open assignments in a container. Size <= 1 under the single-batch
    /// rule; larger only where `allow_mixed` was used.
    pub fn active_interval(&self, container_id: &str) -> Vec<Assignment> {
        let inner = self.inner.read();
        inner
            .active_by_container
            .get(container_id)
            .map(|ids| ids.iter().map(|id| inner.assignments[id].clone()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, id: AssignmentId) -> Result<Assignment, SimError> {
        self.inner
            .read()
            .assignments
            .get(&id)
            .cloned()
            .ok_or(SimError::UnknownAssignment(id))
    }

    pub fn assignments_for_batch(&self, batch_number: &str) -> Vec<Assignment> {
        let mut all: Vec<Assignment> = self
            .inner
            .read()
            .assignments
            .values()
            .filter(|a| a.batch_number == batch_number)
            .cloned()
            .collect();
        all.sort_by_key(|a| a.id);
        all
    }

    pub fn active_assignments_for_batch(&self, batch_number: &str) -> Vec<Assignment> {
        let mut active: Vec<Assignment> = self
            .inner
            .read()
            .assignments
            .values()
            .filter(|a| a.batch_number == batch_number && a.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|a| a.id);
        active
    }

    fn active_mut(inner: &mut LedgerInner, id: AssignmentId) -> Result<&mut Assignment, SimError> {
        let assignment = inner
            .assignments
            .get_mut(&id)
            .ok_or(SimError::UnknownAssignment(id))?;
        if !assignment.is_active {
            let batch = assignment.batch_number.clone();
            return Err(SimError::InvariantFailed {
                batch_number: batch,
                day_number: 0,
                reason: format!("mutation of closed assignment {}", id),
            });
        }
        Ok(assignment)
    }

    fn drop_active(inner: &mut LedgerInner, container_id: &str, id: AssignmentId) {
        if let Some(ids) = inner.active_by_container.get_mut(container_id) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                inner.active_by_container.remove(container_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquasim_schemas::infrastructure::ContainerLocation;

    fn tank(id: &str, max_biomass_kg: f64) -> Container {
        Container {
            container_id: id.to_string(),
            name: id.to_string(),
            type_id: "CT-FRY".to_string(),
            location: ContainerLocation::Hall {
                hall_id: "H".to_string(),
            },
            max_biomass_kg,
            volume_m3: 80.0,
            active: true,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn open_rejects_overload() {
        let ledger = AssignmentLedger::new();
        let container = tank("T1", 10.0);
        let err = ledger
            .open(OpenRequest {
                batch_number: "FO-2025-001",
                container: &container,
                stage: LifecycleStage::Fry,
                date: date(1),
                population_count: 20_000,
                avg_weight_g: 1.0,
                allow_mixed: false,
            })
            .unwrap_err();
        assert!(matches!(err, SimError::CapacityExceeded { .. }));
    }

    #[test]
    fn open_rejects_foreign_occupant_unless_mixed() {
        let ledger = AssignmentLedger::new();
        let container = tank("T1", 1_000.0);
        ledger
            .open(OpenRequest {
                batch_number: "FO-2025-001",
                container: &container,
                stage: LifecycleStage::Fry,
                date: date(1),
                population_count: 100,
                avg_weight_g: 1.0,
                allow_mixed: false,
            })
            .unwrap();

        let busy = ledger
            .open(OpenRequest {
                batch_number: "FO-2025-002",
                container: &container,
                stage: LifecycleStage::Fry,
                date: date(2),
                population_count: 100,
                avg_weight_g: 1.0,
                allow_mixed: false,
            })
            .unwrap_err();
        assert!(matches!(busy, SimError::ContainerBusy { .. }));

        ledger
            .open(OpenRequest {
                batch_number: "FO-2025-002",
                container: &container,
                stage: LifecycleStage::Fry,
                date: date(2),
                population_count: 100,
                avg_weight_g: 1.0,
                allow_mixed: true,
            })
            .unwrap();
        assert_eq!(ledger.active_interval("T1").len(), 2);
    }

    #[test]
    fn same_batch_cannot_overlap_itself() {
        let ledger = AssignmentLedger::new();
        let container = tank("T1", 1_000.0);
        let open = |allow_mixed| {
            ledger.open(OpenRequest {
                batch_number: "FO-2025-001",
                container: &container,
                stage: LifecycleStage::Fry,
                date: date(1),
                population_count: 10,
                avg_weight_g: 1.0,
                allow_mixed,
            })
        };
        open(false).unwrap();
        assert!(matches!(
            open(true).unwrap_err(),
            SimError::InvariantFailed { .. }
        ));
    }

    #[test]
    fn debit_to_zero_closes() {
        let ledger = AssignmentLedger::new();
        let container = tank("T1", 1_000.0);
        let id = ledger
            .open(OpenRequest {
                batch_number: "FO-2025-001",
                container: &container,
                stage: LifecycleStage::Fry,
                date: date(1),
                population_count: 50,
                avg_weight_g: 2.0,
                allow_mixed: false,
            })
            .unwrap();

        ledger.debit(id, 20, date(5)).unwrap();
        let a = ledger.get(id).unwrap();
        assert!(a.is_active);
        assert_eq!(a.population_count, 30);
        assert!((a.biomass_kg - 0.06).abs() < 1e-9);

        ledger.debit(id, 30, date(6)).unwrap();
        let a = ledger.get(id).unwrap();
        assert!(!a.is_active);
        assert_eq!(a.departure_date, Some(date(6)));
        assert!(ledger.active_interval("T1").is_empty());

        assert!(ledger.debit(id, 1, date(7)).is_err());
    }

    #[test]
    fn debit_never_goes_negative() {
        let ledger = AssignmentLedger::new();
        let container = tank("T1", 1_000.0);
        let id = ledger
            .open(OpenRequest {
                batch_number: "FO-2025-001",
                container: &container,
                stage: LifecycleStage::Fry,
                date: date(1),
                population_count: 5,
                avg_weight_g: 2.0,
                allow_mixed: false,
            })
            .unwrap();
        assert!(matches!(
            ledger.debit(id, 6, date(2)).unwrap_err(),
            SimError::InvariantFailed { .. }
        ));
    }

    #[test]
    fn credit_recomputes_blended_weight() {
        let ledger = AssignmentLedger::new();
        let container = tank("T1", 10_000.0);
        let id = ledger
            .open(OpenRequest {
                batch_number: "FO-2025-001",
                container: &container,
                stage: LifecycleStage::Parr,
                date: date(1),
                population_count: 0,
                avg_weight_g: 0.0,
                allow_mixed: false,
            })
            .unwrap();

        ledger.credit(id, 1000, 10.0).unwrap();
        let a = ledger.get(id).unwrap();
        assert_eq!(a.population_count, 1000);
        assert!((a.avg_weight_g - 10.0).abs() < 1e-9);
        assert!((a.biomass_kg - 10.0).abs() < 1e-9);

        ledger.credit(id, 1000, 30.0).unwrap();
        let a = ledger.get(id).unwrap();
        assert!((a.avg_weight_g - 20.0).abs() < 1e-9);
        // Biomass stays consistent with population x avg weight.
        assert!((a.biomass_kg - a.population_count as f64 * a.avg_weight_g / 1000.0).abs() < 1e-6);
    }

    #[test]
    fn hard_close_keeps_population_but_frees_container() {
        let ledger = AssignmentLedger::new();
        let container = tank("T1", 1_000.0);
        let id = ledger
            .open(OpenRequest {
                batch_number: "FO-2025-001",
                container: &container,
                stage: LifecycleStage::Fry,
                date: date(3),
                population_count: 40,
                avg_weight_g: 2.0,
                allow_mixed: false,
            })
            .unwrap();
        assert!(ledger.close(id, date(1)).is_err());
        ledger.close(id, date(9)).unwrap();
        let a = ledger.get(id).unwrap();
        assert!(!a.is_active);
        assert_eq!(a.population_count, 40);
        assert!(ledger.active_interval("T1").is_empty());
        // Closing twice is a no-op.
        ledger.close(id, date(10)).unwrap();
        assert_eq!(ledger.get(id).unwrap().departure_date, Some(date(9)));
    }
}
