#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use cadre_contracts::assessment::{
    AssessmentKind, AssessmentRecord, AssessmentStatus, MaterializeReport,
};
use cadre_contracts::audit::{
    AuditComponent, AuditEventInput, AuditEventType, AuditPayload, AuditSeverity, CorrelationId,
    PayloadKey, PayloadValue, TurnId,
};
use cadre_contracts::cycle::{CycleId, CycleStatus};
use cadre_contracts::directory::EmployeeId;
use cadre_contracts::selection::{FillShortfall, RandomFillReport, SelectionPolicy};
use cadre_contracts::{ContractViolation, MonotonicTimeNs, ReasonCodeId, Validate};
use cadre_engines::quota::QuotaRuntime;
use cadre_engines::random_fill::{fill_seed, FillRuntime};
use cadre_storage::review::{ReviewStore, StorageError};

pub mod reason_codes {
    use cadre_contracts::ReasonCodeId;

    // Cycle-closure reason-code namespace.
    pub const CYCLE_OK_RANDOM_FILL: ReasonCodeId = ReasonCodeId(0x4359_0001);
    pub const CYCLE_OK_MATERIALIZE: ReasonCodeId = ReasonCodeId(0x4359_0002);

    pub const CYCLE_FILL_SHORTFALL: ReasonCodeId = ReasonCodeId(0x4359_0010);
}

/// The two closure-time batch operations, in phase order: random fill moves
/// the cycle Collecting -> Closing and tops up every evaluator's quota;
/// materialize runs only against a Closing cycle and ends it at Completed.
/// The status field is the coordination mechanism between the phases.
#[derive(Debug, Clone)]
pub struct CycleCloseRuntime {
    policy: SelectionPolicy,
    quota: QuotaRuntime,
    fill: FillRuntime,
}

impl CycleCloseRuntime {
    pub fn new(policy: SelectionPolicy) -> Result<Self, ContractViolation> {
        let quota = QuotaRuntime::new(policy)?;
        let fill = FillRuntime::new(policy)?;
        Ok(Self {
            policy,
            quota,
            fill,
        })
    }

    /// Assign every unmet quota by cap-respecting random draw. Evaluators
    /// are visited in seeded-shuffled order and each pool is re-fetched
    /// immediately before its draw, so earlier fills raise `times_chosen`
    /// for later ones. An evaluator that cannot be fully filled is reported
    /// as a shortfall; the batch itself keeps going.
    pub fn random_fill(
        &self,
        store: &mut ReviewStore,
        cycle_id: &CycleId,
        salt: u64,
        now: MonotonicTimeNs,
        correlation_id: CorrelationId,
        turn_id: TurnId,
    ) -> Result<RandomFillReport, StorageError> {
        store.transition_cycle(cycle_id, CycleStatus::Closing, now)?;
        let organization_id = match store.cycle_row(cycle_id) {
            Some(cycle) => cycle.organization_id.clone(),
            None => {
                return Err(StorageError::ForeignKeyViolation {
                    table: "review_cycles",
                    key: cycle_id.as_str().to_string(),
                });
            }
        };

        let mut rng = StdRng::from_seed(fill_seed(cycle_id, salt));
        let mut evaluators: Vec<EmployeeId> = store
            .active_roster(&organization_id)
            .iter()
            .map(|record| record.employee_id.clone())
            .collect();
        evaluators.shuffle(&mut rng);

        let mut total_generated: u32 = 0;
        let mut shortfalls: Vec<FillShortfall> = Vec::new();

        for evaluator_id in &evaluators {
            let pool = store.eligible_peers(&self.policy, cycle_id, evaluator_id)?;
            let own_selections = store.selections_by_evaluator(cycle_id, evaluator_id);
            let already_chosen: BTreeSet<EmployeeId> = own_selections
                .iter()
                .map(|record| record.peer_id.clone())
                .collect();
            // Random rows from an earlier (crashed) run count toward the
            // quota, which keeps a re-run from over-filling.
            let fulfilled = own_selections.len() as u32;
            let quota = self.quota.quota_for(pool.len() as u32);
            let remaining = quota.saturating_sub(fulfilled);
            if remaining == 0 {
                continue;
            }

            let drawn = self
                .fill
                .draw(&mut rng, evaluator_id, &pool, &already_chosen, remaining);
            for peer_id in &drawn {
                store.append_random_selection(&self.policy, now, cycle_id, evaluator_id, peer_id)?;
                total_generated += 1;
            }
            let missing = remaining - drawn.len() as u32;
            if missing > 0 {
                shortfalls.push(FillShortfall {
                    evaluator_id: evaluator_id.clone(),
                    missing,
                });
            }
        }

        let report = RandomFillReport {
            total_generated,
            shortfalls,
        };
        let reason_code = if report.fully_satisfied() {
            reason_codes::CYCLE_OK_RANDOM_FILL
        } else {
            reason_codes::CYCLE_FILL_SHORTFALL
        };
        let severity = if report.fully_satisfied() {
            AuditSeverity::Info
        } else {
            AuditSeverity::Warn
        };
        self.audit_batch(
            store,
            cycle_id,
            AuditComponent::RandomFill,
            AuditEventType::RandomFillCompleted,
            reason_code,
            severity,
            now,
            correlation_id,
            turn_id,
            &[
                ("total_generated", report.total_generated.to_string()),
                ("shortfalls", report.shortfalls.len().to_string()),
                ("salt", salt.to_string()),
            ],
        )?;
        Ok(report)
    }

    /// Expand selections and manager edges into concrete evaluation tasks.
    /// Every insert is an idempotent keyed upsert, so a run interrupted
    /// after some inserts can simply be re-executed.
    pub fn materialize(
        &self,
        store: &mut ReviewStore,
        cycle_id: &CycleId,
        now: MonotonicTimeNs,
        correlation_id: CorrelationId,
        turn_id: TurnId,
    ) -> Result<MaterializeReport, StorageError> {
        let cycle = store
            .cycle_row(cycle_id)
            .ok_or(StorageError::ForeignKeyViolation {
                table: "review_cycles",
                key: cycle_id.as_str().to_string(),
            })?;
        if cycle.status != CycleStatus::Closing {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "review_cycles.status",
                    reason: "materialization requires a Closing cycle",
                },
            ));
        }
        let organization_id = cycle.organization_id.clone();

        let mut peer_assessments: u32 = 0;
        let selections: Vec<(EmployeeId, EmployeeId)> = store
            .selections_for_cycle(cycle_id)
            .iter()
            .map(|record| (record.evaluator_id.clone(), record.peer_id.clone()))
            .collect();
        for (evaluator_id, peer_id) in selections {
            let record = AssessmentRecord::v1(
                cycle_id.clone(),
                evaluator_id,
                peer_id,
                AssessmentKind::Peer,
                AssessmentStatus::Pending,
                now,
                None,
            )?;
            if store.upsert_assessment(record)? {
                peer_assessments += 1;
            }
        }

        let mut hierarchical_assessments: u32 = 0;
        let managed: Vec<(EmployeeId, EmployeeId)> = store
            .active_roster(&organization_id)
            .iter()
            .filter_map(|record| {
                record
                    .manager_id
                    .clone()
                    .map(|manager_id| (manager_id, record.employee_id.clone()))
            })
            .collect();
        for (manager_id, employee_id) in managed {
            // Managers outside the active roster cannot evaluate.
            if store
                .employee_row(&organization_id, &manager_id)
                .filter(|record| record.is_active)
                .is_none()
            {
                continue;
            }
            let record = AssessmentRecord::v1(
                cycle_id.clone(),
                manager_id,
                employee_id,
                AssessmentKind::Hierarchical,
                AssessmentStatus::Pending,
                now,
                None,
            )?;
            if store.upsert_assessment(record)? {
                hierarchical_assessments += 1;
            }
        }

        store.transition_cycle(cycle_id, CycleStatus::Completed, now)?;

        let report = MaterializeReport {
            hierarchical_assessments,
            peer_assessments,
            total_assessments: hierarchical_assessments + peer_assessments,
        };
        report.validate()?;
        self.audit_batch(
            store,
            cycle_id,
            AuditComponent::Materializer,
            AuditEventType::AssessmentsMaterialized,
            reason_codes::CYCLE_OK_MATERIALIZE,
            AuditSeverity::Info,
            now,
            correlation_id,
            turn_id,
            &[
                ("hierarchical", report.hierarchical_assessments.to_string()),
                ("peer", report.peer_assessments.to_string()),
                ("total", report.total_assessments.to_string()),
            ],
        )?;
        Ok(report)
    }

    /// Full closure: random fill, then materialization, in phase order.
    pub fn close_cycle(
        &self,
        store: &mut ReviewStore,
        cycle_id: &CycleId,
        salt: u64,
        now: MonotonicTimeNs,
        correlation_id: CorrelationId,
        turn_id: TurnId,
    ) -> Result<(RandomFillReport, MaterializeReport), StorageError> {
        let fill = self.random_fill(store, cycle_id, salt, now, correlation_id, turn_id)?;
        let materialize = self.materialize(store, cycle_id, now, correlation_id, turn_id)?;
        Ok((fill, materialize))
    }

    #[allow(clippy::too_many_arguments)]
    fn audit_batch(
        &self,
        store: &mut ReviewStore,
        cycle_id: &CycleId,
        component: AuditComponent,
        event_type: AuditEventType,
        reason_code: ReasonCodeId,
        severity: AuditSeverity,
        now: MonotonicTimeNs,
        correlation_id: CorrelationId,
        turn_id: TurnId,
        pairs: &[(&'static str, String)],
    ) -> Result<(), StorageError> {
        let organization_id = store.cycle_row(cycle_id).map(|c| c.organization_id.clone());
        let mut entries = BTreeMap::new();
        for (key, value) in pairs {
            entries.insert(
                PayloadKey::new(*key).map_err(StorageError::ContractViolation)?,
                PayloadValue::new(value.clone()).map_err(StorageError::ContractViolation)?,
            );
        }
        let input = AuditEventInput::v1(
            now,
            organization_id,
            Some(cycle_id.as_str().to_string()),
            None,
            component,
            event_type,
            reason_code,
            severity,
            correlation_id,
            turn_id,
            AuditPayload::v1(entries).map_err(StorageError::ContractViolation)?,
            None,
        )
        .map_err(StorageError::ContractViolation)?;
        store.append_audit_row(input)?;
        Ok(())
    }
}
