#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use cadre_contracts::assessment::{AssessmentKind, AssessmentRecord};
use cadre_contracts::audit::{AuditEvent, AuditEventId, AuditEventInput};
use cadre_contracts::cycle::{
    is_allowed_cycle_transition, CycleId, CycleStatus, CycleTransitionEvent, ReviewCycleRecord,
    CYCLE_CONTRACT_VERSION,
};
use cadre_contracts::directory::{EmployeeId, EmployeeRecord, OrganizationId};
use cadre_contracts::scoring::{
    InstrumentAssessmentId, InstrumentAssessmentRecord, InstrumentAssessmentStatus, InstrumentId,
    TraitResponse, TraitScoreResult, SCORING_CONTRACT_VERSION,
};
use cadre_contracts::selection::{
    EligiblePeer, SelectionOrigin, SelectionPolicy, SelectionRecord,
};
use cadre_contracts::{ContractViolation, MonotonicTimeNs, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation { table: &'static str, key: String },
    DuplicateKey { table: &'static str, key: String },
    AppendOnlyViolation { table: &'static str },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

/// Business reason a registration attempt was refused. These are data-level
/// outcomes, not errors; the orchestration layer maps them to reason codes
/// and user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRejection {
    CycleNotCollecting { status: CycleStatus },
    SelfSelection,
    PeerNotEligible,
    PeerAtCap { times_chosen: u32 },
    QuotaExhausted { quota: u32, manual_count: u32 },
    DuplicateSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegisterAttempt {
    Accepted(SelectionRecord),
    Rejected(SelectionRejection),
}

pub fn selection_digest_hex(record: &SelectionRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.cycle_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(record.evaluator_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(record.peer_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(match record.origin {
        SelectionOrigin::Manual => b"manual".as_slice(),
        SelectionOrigin::Random => b"random".as_slice(),
    });
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// In-memory review-engine store. Selections and audit rows are append-only
/// ledgers with derived projections; `&mut self` on the write path is the
/// serialization point every registration races through.
#[derive(Debug)]
pub struct ReviewStore {
    employees: BTreeMap<(OrganizationId, EmployeeId), EmployeeRecord>,
    cycles: BTreeMap<CycleId, ReviewCycleRecord>,
    cycle_transitions: Vec<CycleTransitionEvent>,

    selections: Vec<SelectionRecord>,
    selection_index: BTreeSet<(CycleId, EmployeeId, EmployeeId)>,
    // (cycle_id, peer_id) -> count of selections targeting the peer.
    times_chosen_current: BTreeMap<(CycleId, EmployeeId), u32>,
    // (cycle_id, evaluator_id) -> count of manual selections by the evaluator.
    manual_count_current: BTreeMap<(CycleId, EmployeeId), u32>,

    assessments: BTreeMap<(CycleId, EmployeeId, EmployeeId, AssessmentKind), AssessmentRecord>,

    instrument_assessments: BTreeMap<InstrumentAssessmentId, InstrumentAssessmentRecord>,
    trait_responses: BTreeMap<InstrumentAssessmentId, Vec<TraitResponse>>,

    audit_events: Vec<AuditEvent>,
    audit_idempotency_index: BTreeMap<String, AuditEventId>,

    next_cycle_transition_event_id: u64,
    next_instrument_assessment_id: u64,
    next_audit_event_id: u64,
}

impl ReviewStore {
    pub fn new_in_memory() -> Self {
        Self {
            employees: BTreeMap::new(),
            cycles: BTreeMap::new(),
            cycle_transitions: Vec::new(),
            selections: Vec::new(),
            selection_index: BTreeSet::new(),
            times_chosen_current: BTreeMap::new(),
            manual_count_current: BTreeMap::new(),
            assessments: BTreeMap::new(),
            instrument_assessments: BTreeMap::new(),
            trait_responses: BTreeMap::new(),
            audit_events: Vec::new(),
            audit_idempotency_index: BTreeMap::new(),
            next_cycle_transition_event_id: 1,
            next_instrument_assessment_id: 1,
            next_audit_event_id: 1,
        }
    }

    // ---- directory view ----

    pub fn insert_employee(&mut self, record: EmployeeRecord) -> Result<(), StorageError> {
        record.validate()?;
        let key = (record.organization_id.clone(), record.employee_id.clone());
        if self.employees.contains_key(&key) {
            return Err(StorageError::DuplicateKey {
                table: "employees",
                key: record.employee_id.as_str().to_string(),
            });
        }
        self.employees.insert(key, record);
        Ok(())
    }

    pub fn employee_row(
        &self,
        organization_id: &OrganizationId,
        employee_id: &EmployeeId,
    ) -> Option<&EmployeeRecord> {
        self.employees
            .get(&(organization_id.clone(), employee_id.clone()))
    }

    /// Active employees of one organization, in id order.
    pub fn active_roster(&self, organization_id: &OrganizationId) -> Vec<&EmployeeRecord> {
        self.employees
            .iter()
            .filter(|((org, _), record)| org == organization_id && record.is_active)
            .map(|(_, record)| record)
            .collect()
    }

    // ---- cycles ----

    pub fn insert_cycle(&mut self, record: ReviewCycleRecord) -> Result<(), StorageError> {
        record.validate()?;
        if record.status != CycleStatus::Draft {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "review_cycles.status",
                    reason: "cycles are created in Draft",
                },
            ));
        }
        if self.cycles.contains_key(&record.cycle_id) {
            return Err(StorageError::DuplicateKey {
                table: "review_cycles",
                key: record.cycle_id.as_str().to_string(),
            });
        }
        self.cycles.insert(record.cycle_id.clone(), record);
        Ok(())
    }

    pub fn cycle_row(&self, cycle_id: &CycleId) -> Option<&ReviewCycleRecord> {
        self.cycles.get(cycle_id)
    }

    pub fn transition_cycle(
        &mut self,
        cycle_id: &CycleId,
        to: CycleStatus,
        now: MonotonicTimeNs,
    ) -> Result<CycleStatus, StorageError> {
        let from = match self.cycles.get(cycle_id) {
            Some(record) => record.status,
            None => {
                return Err(StorageError::ForeignKeyViolation {
                    table: "review_cycles",
                    key: cycle_id.as_str().to_string(),
                });
            }
        };
        if !is_allowed_cycle_transition(from, to) {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "review_cycles.status",
                    reason: "transition not allowed",
                },
            ));
        }
        let event = CycleTransitionEvent {
            schema_version: CYCLE_CONTRACT_VERSION,
            event_id: self.next_cycle_transition_event_id,
            cycle_id: cycle_id.clone(),
            from,
            to,
            occurred_at: now,
        };
        event.validate()?;
        self.cycle_transitions.push(event);
        self.next_cycle_transition_event_id += 1;

        if let Some(record) = self.cycles.get_mut(cycle_id) {
            record.status = to;
            record.updated_at = now;
        }
        Ok(to)
    }

    pub fn cycle_transition_rows(&self) -> &[CycleTransitionEvent] {
        &self.cycle_transitions
    }

    /// Remove a cycle and cascade to every row keyed by it: transition
    /// events, selections (with their projections) and assessments. Audit
    /// rows reference cycles by value, not key, and survive.
    pub fn delete_cycle(&mut self, cycle_id: &CycleId) -> Result<(), StorageError> {
        if self.cycles.remove(cycle_id).is_none() {
            return Err(StorageError::ForeignKeyViolation {
                table: "review_cycles",
                key: cycle_id.as_str().to_string(),
            });
        }
        self.cycle_transitions
            .retain(|event| &event.cycle_id != cycle_id);
        self.selections.retain(|record| &record.cycle_id != cycle_id);
        self.rebuild_selection_projections();
        self.assessments.retain(|(cycle, _, _, _), _| cycle != cycle_id);
        Ok(())
    }

    // ---- selections ----

    pub fn selection_rows(&self) -> &[SelectionRecord] {
        &self.selections
    }

    pub fn selections_for_cycle(&self, cycle_id: &CycleId) -> Vec<&SelectionRecord> {
        self.selections
            .iter()
            .filter(|record| &record.cycle_id == cycle_id)
            .collect()
    }

    pub fn selections_by_evaluator(
        &self,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
    ) -> Vec<&SelectionRecord> {
        self.selections
            .iter()
            .filter(|record| &record.cycle_id == cycle_id && &record.evaluator_id == evaluator_id)
            .collect()
    }

    pub fn times_chosen(&self, cycle_id: &CycleId, peer_id: &EmployeeId) -> u32 {
        self.times_chosen_current
            .get(&(cycle_id.clone(), peer_id.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn manual_count(&self, cycle_id: &CycleId, evaluator_id: &EmployeeId) -> u32 {
        self.manual_count_current
            .get(&(cycle_id.clone(), evaluator_id.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Recompute the selection projections from the ledger. The rebuilt maps
    /// must equal the incrementally-maintained ones.
    pub fn rebuild_selection_projections(&mut self) {
        self.selection_index.clear();
        self.times_chosen_current.clear();
        self.manual_count_current.clear();
        for record in &self.selections {
            self.selection_index.insert((
                record.cycle_id.clone(),
                record.evaluator_id.clone(),
                record.peer_id.clone(),
            ));
            *self
                .times_chosen_current
                .entry((record.cycle_id.clone(), record.peer_id.clone()))
                .or_insert(0) += 1;
            if record.origin == SelectionOrigin::Manual {
                *self
                    .manual_count_current
                    .entry((record.cycle_id.clone(), record.evaluator_id.clone()))
                    .or_insert(0) += 1;
            }
        }
    }

    /// Every employee the evaluator may choose in this cycle, annotated with
    /// the live chosen-count. Recomputed on each call; never cached.
    pub fn eligible_peers(
        &self,
        policy: &SelectionPolicy,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
    ) -> Result<Vec<EligiblePeer>, StorageError> {
        policy.validate()?;
        let cycle = self.cycles.get(cycle_id).ok_or(StorageError::ForeignKeyViolation {
            table: "review_cycles",
            key: cycle_id.as_str().to_string(),
        })?;
        let evaluator = self
            .employee_row(&cycle.organization_id, evaluator_id)
            .filter(|record| record.is_active)
            .ok_or(StorageError::ForeignKeyViolation {
                table: "employees",
                key: evaluator_id.as_str().to_string(),
            })?;

        let mut pool = Vec::new();
        for record in self.active_roster(&cycle.organization_id) {
            if record.employee_id == evaluator.employee_id {
                continue;
            }
            let times_chosen = self.times_chosen(cycle_id, &record.employee_id);
            pool.push(EligiblePeer {
                peer_id: record.employee_id.clone(),
                full_name: record.full_name.clone(),
                email: record.email.clone(),
                job_title: record.job_title.clone(),
                department: record.department.clone(),
                hierarchy_level: record.hierarchy_level,
                times_chosen,
                can_be_chosen: times_chosen < policy.peer_cap,
            });
        }
        Ok(pool)
    }

    /// The atomic check-and-write at the heart of voluntary selection. Every
    /// precondition is re-validated here, against current rows, inside the
    /// same `&mut self` call that appends the ledger row; a caller holding a
    /// stale eligibility snapshot gets a rejection, never a silent overwrite.
    pub fn register_manual_selection(
        &mut self,
        policy: &SelectionPolicy,
        now: MonotonicTimeNs,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        peer_id: &EmployeeId,
    ) -> Result<RegisterAttempt, StorageError> {
        policy.validate()?;
        let cycle = self.cycles.get(cycle_id).ok_or(StorageError::ForeignKeyViolation {
            table: "review_cycles",
            key: cycle_id.as_str().to_string(),
        })?;
        let organization_id = cycle.organization_id.clone();
        if cycle.status != CycleStatus::Collecting {
            return Ok(RegisterAttempt::Rejected(
                SelectionRejection::CycleNotCollecting {
                    status: cycle.status,
                },
            ));
        }
        if self
            .employee_row(&organization_id, evaluator_id)
            .filter(|record| record.is_active)
            .is_none()
        {
            return Err(StorageError::ForeignKeyViolation {
                table: "employees",
                key: evaluator_id.as_str().to_string(),
            });
        }
        if peer_id == evaluator_id {
            return Ok(RegisterAttempt::Rejected(SelectionRejection::SelfSelection));
        }
        if self
            .employee_row(&organization_id, peer_id)
            .filter(|record| record.is_active)
            .is_none()
        {
            return Ok(RegisterAttempt::Rejected(
                SelectionRejection::PeerNotEligible,
            ));
        }
        let triple = (cycle_id.clone(), evaluator_id.clone(), peer_id.clone());
        if self.selection_index.contains(&triple) {
            return Ok(RegisterAttempt::Rejected(
                SelectionRejection::DuplicateSelection,
            ));
        }
        let times_chosen = self.times_chosen(cycle_id, peer_id);
        if times_chosen >= policy.peer_cap {
            return Ok(RegisterAttempt::Rejected(SelectionRejection::PeerAtCap {
                times_chosen,
            }));
        }
        let pool_size = self
            .active_roster(&organization_id)
            .iter()
            .filter(|record| &record.employee_id != evaluator_id)
            .count() as u32;
        let quota = policy.quota_for(pool_size);
        let manual_count = self.manual_count(cycle_id, evaluator_id);
        if manual_count >= quota {
            return Ok(RegisterAttempt::Rejected(
                SelectionRejection::QuotaExhausted {
                    quota,
                    manual_count,
                },
            ));
        }

        let record = SelectionRecord::v1(
            cycle_id.clone(),
            evaluator_id.clone(),
            peer_id.clone(),
            SelectionOrigin::Manual,
            now,
        )?;
        self.apply_selection(record.clone());
        Ok(RegisterAttempt::Accepted(record))
    }

    /// Allocator-side insert. The draw already excluded ineligible peers;
    /// the cap, uniqueness and phase invariants are still enforced here so a
    /// buggy caller cannot corrupt the ledger.
    pub fn append_random_selection(
        &mut self,
        policy: &SelectionPolicy,
        now: MonotonicTimeNs,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        peer_id: &EmployeeId,
    ) -> Result<SelectionRecord, StorageError> {
        policy.validate()?;
        let cycle = self.cycles.get(cycle_id).ok_or(StorageError::ForeignKeyViolation {
            table: "review_cycles",
            key: cycle_id.as_str().to_string(),
        })?;
        if cycle.status != CycleStatus::Closing {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "review_cycles.status",
                    reason: "random selections require a Closing cycle",
                },
            ));
        }
        let triple = (cycle_id.clone(), evaluator_id.clone(), peer_id.clone());
        if self.selection_index.contains(&triple) {
            return Err(StorageError::DuplicateKey {
                table: "selections",
                key: format!(
                    "{}/{}/{}",
                    cycle_id.as_str(),
                    evaluator_id.as_str(),
                    peer_id.as_str()
                ),
            });
        }
        if self.times_chosen(cycle_id, peer_id) >= policy.peer_cap {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "selections.peer_id",
                    reason: "peer already at cap",
                },
            ));
        }
        let record = SelectionRecord::v1(
            cycle_id.clone(),
            evaluator_id.clone(),
            peer_id.clone(),
            SelectionOrigin::Random,
            now,
        )?;
        self.apply_selection(record.clone());
        Ok(record)
    }

    fn apply_selection(&mut self, record: SelectionRecord) {
        self.selection_index.insert((
            record.cycle_id.clone(),
            record.evaluator_id.clone(),
            record.peer_id.clone(),
        ));
        *self
            .times_chosen_current
            .entry((record.cycle_id.clone(), record.peer_id.clone()))
            .or_insert(0) += 1;
        if record.origin == SelectionOrigin::Manual {
            *self
                .manual_count_current
                .entry((record.cycle_id.clone(), record.evaluator_id.clone()))
                .or_insert(0) += 1;
        }
        self.selections.push(record);
    }

    // ---- assessments ----

    /// Idempotent keyed insert; an existing row wins and is left untouched.
    pub fn upsert_assessment(&mut self, record: AssessmentRecord) -> Result<bool, StorageError> {
        record.validate()?;
        let key = (
            record.cycle_id.clone(),
            record.evaluator_id.clone(),
            record.evaluatee_id.clone(),
            record.kind,
        );
        if self.assessments.contains_key(&key) {
            return Ok(false);
        }
        self.assessments.insert(key, record);
        Ok(true)
    }

    pub fn assessment_row(
        &self,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        evaluatee_id: &EmployeeId,
        kind: AssessmentKind,
    ) -> Option<&AssessmentRecord> {
        self.assessments.get(&(
            cycle_id.clone(),
            evaluator_id.clone(),
            evaluatee_id.clone(),
            kind,
        ))
    }

    pub fn assessments_for_cycle(&self, cycle_id: &CycleId) -> Vec<&AssessmentRecord> {
        self.assessments
            .iter()
            .filter(|((cycle, _, _, _), _)| cycle == cycle_id)
            .map(|(_, record)| record)
            .collect()
    }

    // ---- instrument assessments ----

    pub fn create_instrument_assessment(
        &mut self,
        subject_id: EmployeeId,
        instrument_id: InstrumentId,
        now: MonotonicTimeNs,
    ) -> Result<InstrumentAssessmentId, StorageError> {
        let assessment_id = InstrumentAssessmentId(self.next_instrument_assessment_id);
        let record = InstrumentAssessmentRecord {
            schema_version: SCORING_CONTRACT_VERSION,
            assessment_id,
            subject_id,
            instrument_id,
            status: InstrumentAssessmentStatus::InProgress,
            score_result: None,
            created_at: now,
            completed_at: None,
        };
        record.validate()?;
        self.instrument_assessments.insert(assessment_id, record);
        self.next_instrument_assessment_id += 1;
        Ok(assessment_id)
    }

    pub fn instrument_assessment_row(
        &self,
        assessment_id: InstrumentAssessmentId,
    ) -> Option<&InstrumentAssessmentRecord> {
        self.instrument_assessments.get(&assessment_id)
    }

    /// Responses are append-only while the assessment is in progress and
    /// frozen once it completes.
    pub fn append_trait_response(
        &mut self,
        assessment_id: InstrumentAssessmentId,
        response: TraitResponse,
    ) -> Result<u32, StorageError> {
        response.validate()?;
        let record = self.instrument_assessments.get(&assessment_id).ok_or(
            StorageError::ForeignKeyViolation {
                table: "instrument_assessments",
                key: assessment_id.0.to_string(),
            },
        )?;
        if record.status != InstrumentAssessmentStatus::InProgress {
            return Err(StorageError::AppendOnlyViolation {
                table: "trait_responses",
            });
        }
        let responses = self.trait_responses.entry(assessment_id).or_default();
        responses.push(response);
        Ok(responses.len() as u32)
    }

    pub fn trait_response_rows(&self, assessment_id: InstrumentAssessmentId) -> &[TraitResponse] {
        self.trait_responses
            .get(&assessment_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn complete_instrument_assessment(
        &mut self,
        assessment_id: InstrumentAssessmentId,
        result: TraitScoreResult,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        result.validate()?;
        let record = self.instrument_assessments.get_mut(&assessment_id).ok_or(
            StorageError::ForeignKeyViolation {
                table: "instrument_assessments",
                key: assessment_id.0.to_string(),
            },
        )?;
        if record.status == InstrumentAssessmentStatus::Completed {
            return Err(StorageError::AppendOnlyViolation {
                table: "instrument_assessments",
            });
        }
        record.status = InstrumentAssessmentStatus::Completed;
        record.score_result = Some(result);
        record.completed_at = Some(now);
        Ok(())
    }

    // ---- audit ----

    pub fn append_audit_row(
        &mut self,
        input: AuditEventInput,
    ) -> Result<AuditEventId, StorageError> {
        input.validate()?;
        if let Some(key) = &input.idempotency_key {
            if let Some(existing) = self.audit_idempotency_index.get(key) {
                return Ok(*existing);
            }
        }
        let event_id = AuditEventId(self.next_audit_event_id);
        if let Some(key) = &input.idempotency_key {
            self.audit_idempotency_index.insert(key.clone(), event_id);
        }
        self.audit_events.push(AuditEvent { event_id, input });
        self.next_audit_event_id += 1;
        Ok(event_id)
    }

    pub fn audit_rows(&self) -> &[AuditEvent] {
        &self.audit_events
    }
}
