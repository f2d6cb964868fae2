#![forbid(unsafe_code)]

use cadre_contracts::assessment::{AssessmentKind, AssessmentRecord};
use cadre_contracts::audit::{AuditEvent, AuditEventId, AuditEventInput};
use cadre_contracts::cycle::{CycleId, CycleStatus, CycleTransitionEvent, ReviewCycleRecord};
use cadre_contracts::directory::{EmployeeId, EmployeeRecord, OrganizationId};
use cadre_contracts::scoring::{
    InstrumentAssessmentId, InstrumentAssessmentRecord, InstrumentId, TraitResponse,
    TraitScoreResult,
};
use cadre_contracts::selection::{EligiblePeer, SelectionPolicy, SelectionRecord};
use cadre_contracts::MonotonicTimeNs;

use crate::review::{RegisterAttempt, ReviewStore, StorageError};

/// Typed repository interface over the engine's directory view.
pub trait DirectoryRepo {
    fn insert_employee_row(&mut self, record: EmployeeRecord) -> Result<(), StorageError>;
    fn employee_row(
        &self,
        organization_id: &OrganizationId,
        employee_id: &EmployeeId,
    ) -> Option<&EmployeeRecord>;
    fn active_roster_rows(&self, organization_id: &OrganizationId) -> Vec<&EmployeeRecord>;
}

/// Typed repository interface for review-cycle lifecycle persistence.
pub trait ReviewCycleRepo {
    fn insert_cycle_row(&mut self, record: ReviewCycleRecord) -> Result<(), StorageError>;
    fn cycle_row(&self, cycle_id: &CycleId) -> Option<&ReviewCycleRecord>;
    fn transition_cycle_row(
        &mut self,
        cycle_id: &CycleId,
        to: CycleStatus,
        now: MonotonicTimeNs,
    ) -> Result<CycleStatus, StorageError>;
    fn cycle_transition_rows(&self) -> &[CycleTransitionEvent];
    fn delete_cycle_row(&mut self, cycle_id: &CycleId) -> Result<(), StorageError>;
}

/// Typed repository interface for the selection ledger and its projections.
pub trait SelectionRepo {
    fn eligible_peer_rows(
        &self,
        policy: &SelectionPolicy,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
    ) -> Result<Vec<EligiblePeer>, StorageError>;
    fn register_manual_selection_row(
        &mut self,
        policy: &SelectionPolicy,
        now: MonotonicTimeNs,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        peer_id: &EmployeeId,
    ) -> Result<RegisterAttempt, StorageError>;
    fn append_random_selection_row(
        &mut self,
        policy: &SelectionPolicy,
        now: MonotonicTimeNs,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        peer_id: &EmployeeId,
    ) -> Result<SelectionRecord, StorageError>;
    fn selections_for_cycle_rows(&self, cycle_id: &CycleId) -> Vec<&SelectionRecord>;
    fn times_chosen_count(&self, cycle_id: &CycleId, peer_id: &EmployeeId) -> u32;
    fn manual_count(&self, cycle_id: &CycleId, evaluator_id: &EmployeeId) -> u32;
    fn rebuild_selection_projection_rows(&mut self);
}

/// Typed repository interface for materialized evaluation tasks.
pub trait AssessmentRepo {
    fn upsert_assessment_row(&mut self, record: AssessmentRecord) -> Result<bool, StorageError>;
    fn assessment_row(
        &self,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        evaluatee_id: &EmployeeId,
        kind: AssessmentKind,
    ) -> Option<&AssessmentRecord>;
    fn assessments_for_cycle_rows(&self, cycle_id: &CycleId) -> Vec<&AssessmentRecord>;
}

/// Typed repository interface for instrument runs and their responses.
pub trait InstrumentScoreRepo {
    fn create_instrument_assessment_row(
        &mut self,
        subject_id: EmployeeId,
        instrument_id: InstrumentId,
        now: MonotonicTimeNs,
    ) -> Result<InstrumentAssessmentId, StorageError>;
    fn instrument_assessment_row(
        &self,
        assessment_id: InstrumentAssessmentId,
    ) -> Option<&InstrumentAssessmentRecord>;
    fn append_trait_response_row(
        &mut self,
        assessment_id: InstrumentAssessmentId,
        response: TraitResponse,
    ) -> Result<u32, StorageError>;
    fn trait_response_rows(&self, assessment_id: InstrumentAssessmentId) -> &[TraitResponse];
    fn complete_instrument_assessment_row(
        &mut self,
        assessment_id: InstrumentAssessmentId,
        result: TraitScoreResult,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
}

/// Typed repository interface for append-only audit persistence.
pub trait ReviewAuditRepo {
    fn append_audit_row(&mut self, input: AuditEventInput) -> Result<AuditEventId, StorageError>;
    fn audit_rows(&self) -> &[AuditEvent];
}

impl DirectoryRepo for ReviewStore {
    fn insert_employee_row(&mut self, record: EmployeeRecord) -> Result<(), StorageError> {
        self.insert_employee(record)
    }

    fn employee_row(
        &self,
        organization_id: &OrganizationId,
        employee_id: &EmployeeId,
    ) -> Option<&EmployeeRecord> {
        ReviewStore::employee_row(self, organization_id, employee_id)
    }

    fn active_roster_rows(&self, organization_id: &OrganizationId) -> Vec<&EmployeeRecord> {
        self.active_roster(organization_id)
    }
}

impl ReviewCycleRepo for ReviewStore {
    fn insert_cycle_row(&mut self, record: ReviewCycleRecord) -> Result<(), StorageError> {
        self.insert_cycle(record)
    }

    fn cycle_row(&self, cycle_id: &CycleId) -> Option<&ReviewCycleRecord> {
        ReviewStore::cycle_row(self, cycle_id)
    }

    fn transition_cycle_row(
        &mut self,
        cycle_id: &CycleId,
        to: CycleStatus,
        now: MonotonicTimeNs,
    ) -> Result<CycleStatus, StorageError> {
        self.transition_cycle(cycle_id, to, now)
    }

    fn cycle_transition_rows(&self) -> &[CycleTransitionEvent] {
        ReviewStore::cycle_transition_rows(self)
    }

    fn delete_cycle_row(&mut self, cycle_id: &CycleId) -> Result<(), StorageError> {
        self.delete_cycle(cycle_id)
    }
}

impl SelectionRepo for ReviewStore {
    fn eligible_peer_rows(
        &self,
        policy: &SelectionPolicy,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
    ) -> Result<Vec<EligiblePeer>, StorageError> {
        self.eligible_peers(policy, cycle_id, evaluator_id)
    }

    fn register_manual_selection_row(
        &mut self,
        policy: &SelectionPolicy,
        now: MonotonicTimeNs,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        peer_id: &EmployeeId,
    ) -> Result<RegisterAttempt, StorageError> {
        self.register_manual_selection(policy, now, cycle_id, evaluator_id, peer_id)
    }

    fn append_random_selection_row(
        &mut self,
        policy: &SelectionPolicy,
        now: MonotonicTimeNs,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        peer_id: &EmployeeId,
    ) -> Result<SelectionRecord, StorageError> {
        self.append_random_selection(policy, now, cycle_id, evaluator_id, peer_id)
    }

    fn selections_for_cycle_rows(&self, cycle_id: &CycleId) -> Vec<&SelectionRecord> {
        self.selections_for_cycle(cycle_id)
    }

    fn times_chosen_count(&self, cycle_id: &CycleId, peer_id: &EmployeeId) -> u32 {
        self.times_chosen(cycle_id, peer_id)
    }

    fn manual_count(&self, cycle_id: &CycleId, evaluator_id: &EmployeeId) -> u32 {
        ReviewStore::manual_count(self, cycle_id, evaluator_id)
    }

    fn rebuild_selection_projection_rows(&mut self) {
        self.rebuild_selection_projections()
    }
}

impl AssessmentRepo for ReviewStore {
    fn upsert_assessment_row(&mut self, record: AssessmentRecord) -> Result<bool, StorageError> {
        self.upsert_assessment(record)
    }

    fn assessment_row(
        &self,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
        evaluatee_id: &EmployeeId,
        kind: AssessmentKind,
    ) -> Option<&AssessmentRecord> {
        ReviewStore::assessment_row(self, cycle_id, evaluator_id, evaluatee_id, kind)
    }

    fn assessments_for_cycle_rows(&self, cycle_id: &CycleId) -> Vec<&AssessmentRecord> {
        self.assessments_for_cycle(cycle_id)
    }
}

impl InstrumentScoreRepo for ReviewStore {
    fn create_instrument_assessment_row(
        &mut self,
        subject_id: EmployeeId,
        instrument_id: InstrumentId,
        now: MonotonicTimeNs,
    ) -> Result<InstrumentAssessmentId, StorageError> {
        self.create_instrument_assessment(subject_id, instrument_id, now)
    }

    fn instrument_assessment_row(
        &self,
        assessment_id: InstrumentAssessmentId,
    ) -> Option<&InstrumentAssessmentRecord> {
        ReviewStore::instrument_assessment_row(self, assessment_id)
    }

    fn append_trait_response_row(
        &mut self,
        assessment_id: InstrumentAssessmentId,
        response: TraitResponse,
    ) -> Result<u32, StorageError> {
        self.append_trait_response(assessment_id, response)
    }

    fn trait_response_rows(&self, assessment_id: InstrumentAssessmentId) -> &[TraitResponse] {
        ReviewStore::trait_response_rows(self, assessment_id)
    }

    fn complete_instrument_assessment_row(
        &mut self,
        assessment_id: InstrumentAssessmentId,
        result: TraitScoreResult,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.complete_instrument_assessment(assessment_id, result, now)
    }
}

impl ReviewAuditRepo for ReviewStore {
    fn append_audit_row(&mut self, input: AuditEventInput) -> Result<AuditEventId, StorageError> {
        ReviewStore::append_audit_row(self, input)
    }

    fn audit_rows(&self) -> &[AuditEvent] {
        ReviewStore::audit_rows(self)
    }
}
