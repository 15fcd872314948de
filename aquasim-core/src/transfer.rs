//! The container-movement workflow: a header grouping one action per source
//! container, moved through `Draft -> Planned -> InProgress -> Completed |
//! Cancelled`. Actions are the single source of truth for population
//! movement; destinations always open with zero population and receive
//! their fish exclusively through action execution.

use crate::error::SimError;
use crate::ledger::{AssignmentId, AssignmentLedger, OpenRequest};
use aquasim_schemas::infrastructure::Container;
use aquasim_schemas::stage::LifecycleStage;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Draft,
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// How the fish were physically moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMethod {
    Pump,
    Wellboat,
    Manual,
}

/// Water conditions recorded at action execution time, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferConditions {
    pub water_temp_c: f64,
    pub dissolved_oxygen_mg_l: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferAction {
    pub action_id: String,
    pub source_assignment: AssignmentId,
    pub dest_assignment: Option<AssignmentId>,
    pub planned_count: u64,
    pub transferred_count: u64,
    pub mortality_during_transfer: u64,
    pub transferred_biomass_kg: f64,
    pub state: ActionState,
    pub executed_on: Option<NaiveDate>,
    pub method: Option<TransferMethod>,
    pub env_snapshot: Option<TransferConditions>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferWorkflow {
    pub workflow_id: String,
    pub batch_number: String,
    pub to_stage: LifecycleStage,
    pub state: WorkflowState,
    pub planned_date: NaiveDate,
    pub finalized_on: Option<NaiveDate>,
    pub started_on: Option<NaiveDate>,
    pub completed_on: Option<NaiveDate>,
    pub cancel_reason: Option<String>,
    pub actions: Vec<TransferAction>,
}

/// One planned source-to-destination pairing.
pub struct PlannedMove<'a> {
    pub source_assignment: AssignmentId,
    pub destination: &'a Container,
    pub count: u64,
    pub avg_weight_g: f64,
    /// Forwarded to the ledger open; per-action by design.
    pub allow_mixed: bool,
}

impl TransferWorkflow {
    /// Drafts a workflow pairing each source assignment with a destination
    /// container. Destination assignments are opened later, at `finalize`.
    pub fn plan(
        workflow_id: &str,
        batch_number: &str,
        to_stage: LifecycleStage,
        planned_date: NaiveDate,
        moves: &[PlannedMove<'_>],
    ) -> TransferWorkflow {
        let actions = moves
            .iter()
            .enumerate()
            .map(|(i, m)| TransferAction {
                action_id: format!("{}-A{:02}", workflow_id, i + 1),
                source_assignment: m.source_assignment,
                dest_assignment: None,
                planned_count: m.count,
                transferred_count: 0,
                mortality_during_transfer: 0,
                transferred_biomass_kg: 0.0,
                state: ActionState::Pending,
                executed_on: None,
                method: None,
                env_snapshot: None,
                failure_reason: None,
            })
            .collect();
        TransferWorkflow {
            workflow_id: workflow_id.to_string(),
            batch_number: batch_number.to_string(),
            to_stage,
            state: WorkflowState::Draft,
            planned_date,
            finalized_on: None,
            started_on: None,
            completed_on: None,
            cancel_reason: None,
            actions,
        }
    }

    /// Validates capacity and occupancy for every destination, opens the
    /// zero-populated destination assignments, and moves the workflow to
    /// `Planned`. A destination that fails validation marks its action
    /// `Failed` and surfaces the error to the caller for the retry path.
    pub fn finalize(
        &mut self,
        ledger: &AssignmentLedger,
        moves: &[PlannedMove<'_>],
        date: NaiveDate,
    ) -> Result<(), SimError> {
        self.expect_state(WorkflowState::Draft, "finalize")?;
        for (action, m) in self.actions.iter_mut().zip(moves) {
            // Capacity is validated against the planned load even though the
            // assignment opens empty.
            let planned_biomass = m.count as f64 * m.avg_weight_g / 1000.0;
            if planned_biomass > m.destination.max_biomass_kg {
                action.state = ActionState::Failed;
                action.failure_reason = Some("destination capacity exceeded".to_string());
                return Err(SimError::CapacityExceeded {
                    batch_number: self.batch_number.clone(),
                    container_id: m.destination.container_id.clone(),
                    biomass_kg: planned_biomass,
                    max_biomass_kg: m.destination.max_biomass_kg,
                });
            }
            match ledger.open(OpenRequest {
                batch_number: &self.batch_number,
                container: m.destination,
                stage: self.to_stage,
                date,
                population_count: 0,
                avg_weight_g: 0.0,
                allow_mixed: m.allow_mixed,
            }) {
                Ok(dest_id) => action.dest_assignment = Some(dest_id),
                Err(err) => {
                    action.state = ActionState::Failed;
                    action.failure_reason = Some(err.to_string());
                    return Err(err);
                }
            }
        }
        self.state = WorkflowState::Planned;
        self.finalized_on = Some(date);
        Ok(())
    }

    /// Executes one action: credits the destination with the surviving fish
    /// and debits the source by the full departure count. The source closes
    /// automatically when it reaches zero.
    pub fn execute_action(
        &mut self,
        index: usize,
        ledger: &AssignmentLedger,
        mortality_during_transfer: u64,
        method: TransferMethod,
        env_snapshot: TransferConditions,
        date: NaiveDate,
    ) -> Result<(), SimError> {
        if !matches!(self.state, WorkflowState::Planned | WorkflowState::InProgress) {
            return Err(self.state_error("execute_action"));
        }
        let batch_number = self.batch_number.clone();
        let workflow_id = self.workflow_id.clone();
        let action = &mut self.actions[index];
        if action.state != ActionState::Pending {
            return Err(SimError::WorkflowState {
                workflow_id,
                operation: "execute_action".to_string(),
                state: format!("{:?}", action.state),
            });
        }
        action.state = ActionState::InProgress;

        // `planned_count` is the total departure from the source; transit
        // deaths come out of it, so surviving + mortality never exceeds the
        // source population.
        let source = ledger.get(action.source_assignment)?;
        let moved = action.planned_count.min(source.population_count);
        if mortality_during_transfer > moved {
            action.state = ActionState::Failed;
            action.failure_reason = Some("transfer mortality exceeds moved count".to_string());
            return Err(SimError::InvariantFailed {
                batch_number,
                day_number: 0,
                reason: format!(
                    "transfer mortality {} exceeds moved count {}",
                    mortality_during_transfer, moved
                ),
            });
        }
        let surviving = moved - mortality_during_transfer;
        let biomass_kg = surviving as f64 * source.avg_weight_g / 1000.0;

        let dest = action.dest_assignment.ok_or_else(|| SimError::WorkflowState {
            workflow_id,
            operation: "execute_action without destination".to_string(),
            state: "missing destination".to_string(),
        })?;
        ledger.credit(dest, surviving, biomass_kg)?;
        ledger.debit(action.source_assignment, moved, date)?;

        action.transferred_count = surviving;
        action.mortality_during_transfer = mortality_during_transfer;
        action.transferred_biomass_kg = biomass_kg;
        action.state = ActionState::Completed;
        action.executed_on = Some(date);
        action.method = Some(method);
        action.env_snapshot = Some(env_snapshot);
        debug!(
            workflow = %self.workflow_id,
            action = %action.action_id,
            moved = surviving,
            "transfer action completed"
        );

        if self.state == WorkflowState::Planned {
            self.state = WorkflowState::InProgress;
            self.started_on = Some(date);
        }
        if self
            .actions
            .iter()
            .all(|a| a.state != ActionState::Pending && a.state != ActionState::InProgress)
        {
            self.state = WorkflowState::Completed;
            self.completed_on = Some(date);
        }
        Ok(())
    }

    /// Cancels a not-yet-completed workflow; remaining pending actions are
    /// skipped. Completed workflows are immutable.
    pub fn cancel(&mut self, reason: &str, date: NaiveDate) -> Result<(), SimError> {
        match self.state {
            WorkflowState::Draft | WorkflowState::Planned | WorkflowState::InProgress => {
                for action in &mut self.actions {
                    if action.state == ActionState::Pending {
                        action.state = ActionState::Skipped;
                    }
                }
                self.state = WorkflowState::Cancelled;
                self.cancel_reason = Some(reason.to_string());
                self.completed_on = Some(date);
                Ok(())
            }
            _ => Err(self.state_error("cancel")),
        }
    }

    pub fn completed_actions(&self) -> impl Iterator<Item = &TransferAction> {
        self.actions
            .iter()
            .filter(|a| a.state == ActionState::Completed)
    }

    fn expect_state(&self, expected: WorkflowState, operation: &str) -> Result<(), SimError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.state_error(operation))
        }
    }

    fn state_error(&self, operation: &str) -> SimError {
        SimError::WorkflowState {
            workflow_id: self.workflow_id.clone(),
            operation: operation.to_string(),
            state: format!("{:?}", self.state),
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
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn conditions() -> TransferConditions {
        TransferConditions {
            water_temp_c: 12.0,
            dissolved_oxygen_mg_l: 9.8,
        }
    }

    fn seeded_source(ledger: &AssignmentLedger, container: &Container, pop: u64) -> AssignmentId {
        ledger
            .open(OpenRequest {
                batch_number: "FO-2025-001",
                container,
                stage: LifecycleStage::EggAlevin,
                date: date(1),
                population_count: pop,
                avg_weight_g: 0.5,
                allow_mixed: false,
            })
            .unwrap()
    }

    #[test]
    fn full_lifecycle_planned_to_completed() {
        let ledger = AssignmentLedger::new();
        let source_tank = tank("A1", 1_000.0);
        let dest_tank = tank("B1", 5_000.0);
        let source = seeded_source(&ledger, &source_tank, 10_000);

        let moves = vec![PlannedMove {
            source_assignment: source,
            destination: &dest_tank,
            count: 10_000,
            avg_weight_g: 0.5,
            allow_mixed: false,
        }];
        let mut wf =
            TransferWorkflow::plan("TW-1", "FO-2025-001", LifecycleStage::Fry, date(5), &moves);
        assert_eq!(wf.state, WorkflowState::Draft);

        wf.finalize(&ledger, &moves, date(5)).unwrap();
        assert_eq!(wf.state, WorkflowState::Planned);
        let dest = wf.actions[0].dest_assignment.unwrap();
        // Destination opened with zero population before any credit.
        assert_eq!(ledger.get(dest).unwrap().population_count, 0);

        wf.execute_action(0, &ledger, 25, TransferMethod::Pump, conditions(), date(5))
            .unwrap();
        assert_eq!(wf.state, WorkflowState::Completed);
        assert_eq!(wf.actions[0].transferred_count, 9_975);
        assert_eq!(wf.actions[0].method, Some(TransferMethod::Pump));
        assert!(wf.actions[0].env_snapshot.is_some());

        let source_after = ledger.get(source).unwrap();
        assert!(!source_after.is_active);
        assert_eq!(source_after.population_count, 0);
        let dest_after = ledger.get(dest).unwrap();
        assert_eq!(dest_after.population_count, 9_975);
        assert!((dest_after.avg_weight_g - 0.5).abs() < 1e-9);

        // Completed workflows are immutable.
        assert!(wf.cancel("too late", date(6)).is_err());
    }

    #[test]
    fn finalize_rejects_undersized_destination() {
        let ledger = AssignmentLedger::new();
        let source_tank = tank("A1", 1_000.0);
        let dest_tank = tank("B1", 1.0);
        let source = seeded_source(&ledger, &source_tank, 10_000);

        let moves = vec![PlannedMove {
            source_assignment: source,
            destination: &dest_tank,
            count: 10_000,
            avg_weight_g: 0.5,
            allow_mixed: false,
        }];
        let mut wf =
            TransferWorkflow::plan("TW-1", "FO-2025-001", LifecycleStage::Fry, date(5), &moves);
        let err = wf.finalize(&ledger, &moves, date(5)).unwrap_err();
        assert!(matches!(err, SimError::CapacityExceeded { .. }));
        assert_eq!(wf.actions[0].state, ActionState::Failed);
        assert_eq!(wf.state, WorkflowState::Draft);
    }

    #[test]
    fn cancel_skips_pending_actions() {
        let ledger = AssignmentLedger::new();
        let source_tank_a = tank("A1", 1_000.0);
        let source_tank_b = tank("A2", 1_000.0);
        let dest_a = tank("B1", 5_000.0);
        let dest_b = tank("B2", 5_000.0);
        let s1 = seeded_source(&ledger, &source_tank_a, 1_000);
        let s2 = seeded_source(&ledger, &source_tank_b, 1_000);

        let moves = vec![
            PlannedMove {
                source_assignment: s1,
                destination: &dest_a,
                count: 1_000,
                avg_weight_g: 0.5,
                allow_mixed: false,
            },
            PlannedMove {
                source_assignment: s2,
                destination: &dest_b,
                count: 1_000,
                avg_weight_g: 0.5,
                allow_mixed: false,
            },
        ];
        let mut wf =
            TransferWorkflow::plan("TW-1", "FO-2025-001", LifecycleStage::Fry, date(5), &moves);
        wf.finalize(&ledger, &moves, date(5)).unwrap();
        wf.execute_action(0, &ledger, 0, TransferMethod::Pump, conditions(), date(5))
            .unwrap();
        assert_eq!(wf.state, WorkflowState::InProgress);

        wf.cancel("operational halt", date(6)).unwrap();
        assert_eq!(wf.state, WorkflowState::Cancelled);
        assert_eq!(wf.actions[0].state, ActionState::Completed);
        assert_eq!(wf.actions[1].state, ActionState::Skipped);
    }

    #[test]
    fn transfer_cannot_exceed_source_population() {
        let ledger = AssignmentLedger::new();
        let source_tank = tank("A1", 1_000.0);
        let dest_tank = tank("B1", 5_000.0);
        let source = seeded_source(&ledger, &source_tank, 100);

        let moves = vec![PlannedMove {
            source_assignment: source,
            destination: &dest_tank,
            count: 100,
            avg_weight_g: 0.5,
            allow_mixed: false,
        }];
        let mut wf =
            TransferWorkflow::plan("TW-1", "FO-2025-001", LifecycleStage::Fry, date(5), &moves);
        wf.finalize(&ledger, &moves, date(5)).unwrap();
        let err = wf
            .execute_action(0, &ledger, 101, TransferMethod::Pump, conditions(), date(5))
            .unwrap_err();
        assert!(matches!(err, SimError::InvariantFailed { .. }));
        assert_eq!(wf.actions[0].state, ActionState::Failed);
    }
}
