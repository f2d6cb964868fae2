#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cadre_contracts::assessment::{AssessmentKind, AssessmentRecord, AssessmentStatus};
use cadre_contracts::audit::{
    AuditComponent, AuditEventInput, AuditEventType, AuditPayload, AuditSeverity, CorrelationId,
    PayloadKey, PayloadValue, TurnId,
};
use cadre_contracts::cycle::CycleId;
use cadre_contracts::directory::{EmployeeId, OrganizationId};
use cadre_contracts::scoring::{
    AxisId, AxisScores, Block, InstrumentId, TraitResponse, TraitScoreResult,
};
use cadre_contracts::selection::{SelectionOrigin, SelectionRecord};
use cadre_contracts::{MonotonicTimeNs, ReasonCodeId};
use cadre_storage::review::{selection_digest_hex, ReviewStore, StorageError};

fn emp(id: &str) -> EmployeeId {
    EmployeeId::new(id).unwrap()
}

fn cycle() -> CycleId {
    CycleId::new("cycle_1").unwrap()
}

fn assessment(evaluator: &str, evaluatee: &str, kind: AssessmentKind) -> AssessmentRecord {
    AssessmentRecord::v1(
        cycle(),
        emp(evaluator),
        emp(evaluatee),
        kind,
        AssessmentStatus::Pending,
        MonotonicTimeNs(900),
        None,
    )
    .unwrap()
}

fn score_result() -> TraitScoreResult {
    let mut natural = AxisScores::new();
    natural.insert(AxisId::new("direction").unwrap(), 2);
    natural.insert(AxisId::new("energy").unwrap(), 1);
    TraitScoreResult {
        instrument_id: InstrumentId::new("pi_v1").unwrap(),
        natural,
        adapted: None,
        gaps: None,
        primary: Some(AxisId::new("direction").unwrap()),
        secondary: Some(AxisId::new("energy").unwrap()),
        skipped_responses: 0,
    }
}

#[test]
fn at_assessment_db_01_upsert_is_idempotent_per_kind() {
    let mut s = ReviewStore::new_in_memory();
    assert!(s
        .upsert_assessment(assessment("emp_a", "emp_b", AssessmentKind::Peer))
        .unwrap());
    assert!(!s
        .upsert_assessment(assessment("emp_a", "emp_b", AssessmentKind::Peer))
        .unwrap());
    // Same pair, different kind, is a distinct task.
    assert!(s
        .upsert_assessment(assessment("emp_a", "emp_b", AssessmentKind::Hierarchical))
        .unwrap());
    assert_eq!(s.assessments_for_cycle(&cycle()).len(), 2);
}

#[test]
fn at_assessment_db_02_existing_row_is_left_untouched_on_upsert() {
    let mut s = ReviewStore::new_in_memory();
    s.upsert_assessment(assessment("emp_a", "emp_b", AssessmentKind::Peer))
        .unwrap();
    let mut later = assessment("emp_a", "emp_b", AssessmentKind::Peer);
    later.created_at = MonotonicTimeNs(9_999);
    s.upsert_assessment(later).unwrap();
    let row = s
        .assessment_row(&cycle(), &emp("emp_a"), &emp("emp_b"), AssessmentKind::Peer)
        .unwrap();
    assert_eq!(row.created_at, MonotonicTimeNs(900));
}

#[test]
fn at_assessment_db_03_responses_are_append_only_until_completion() {
    let mut s = ReviewStore::new_in_memory();
    let id = s
        .create_instrument_assessment(
            emp("emp_subject"),
            InstrumentId::new("pi_v1").unwrap(),
            MonotonicTimeNs(100),
        )
        .unwrap();

    let count = s
        .append_trait_response(
            id,
            TraitResponse::v1("direction", Block::Natural, MonotonicTimeNs(110)).unwrap(),
        )
        .unwrap();
    assert_eq!(count, 1);

    s.complete_instrument_assessment(id, score_result(), MonotonicTimeNs(200))
        .unwrap();

    assert!(matches!(
        s.append_trait_response(
            id,
            TraitResponse::v1("energy", Block::Natural, MonotonicTimeNs(210)).unwrap(),
        ),
        Err(StorageError::AppendOnlyViolation {
            table: "trait_responses",
        })
    ));
    assert_eq!(s.trait_response_rows(id).len(), 1);
}

#[test]
fn at_assessment_db_04_completing_twice_is_refused() {
    let mut s = ReviewStore::new_in_memory();
    let id = s
        .create_instrument_assessment(
            emp("emp_subject"),
            InstrumentId::new("pi_v1").unwrap(),
            MonotonicTimeNs(100),
        )
        .unwrap();
    s.complete_instrument_assessment(id, score_result(), MonotonicTimeNs(200))
        .unwrap();
    assert!(matches!(
        s.complete_instrument_assessment(id, score_result(), MonotonicTimeNs(300)),
        Err(StorageError::AppendOnlyViolation {
            table: "instrument_assessments",
        })
    ));

    let row = s.instrument_assessment_row(id).unwrap();
    assert_eq!(row.completed_at, Some(MonotonicTimeNs(200)));
    assert_eq!(row.score_result.as_ref().unwrap().primary.as_ref().unwrap().as_str(), "direction");
}

#[test]
fn at_assessment_db_05_audit_idempotency_dedupes() {
    let mut s = ReviewStore::new_in_memory();
    let mut entries = BTreeMap::new();
    entries.insert(
        PayloadKey::new("peer_id").unwrap(),
        PayloadValue::new("emp_b").unwrap(),
    );
    let input = AuditEventInput::v1(
        MonotonicTimeNs(700),
        Some(OrganizationId::new("org_a").unwrap()),
        Some("cycle_1".to_string()),
        Some(emp("emp_a")),
        AuditComponent::Registrar,
        AuditEventType::SelectionAccepted,
        ReasonCodeId(0x5247_0001),
        AuditSeverity::Info,
        CorrelationId(42),
        TurnId(1),
        AuditPayload::v1(entries).unwrap(),
        Some("register_cycle_1_emp_a_emp_b".to_string()),
    )
    .unwrap();

    let first = s.append_audit_row(input.clone()).unwrap();
    let second = s.append_audit_row(input).unwrap();
    assert_eq!(first, second);
    assert_eq!(s.audit_rows().len(), 1);
}

#[test]
fn at_assessment_db_06_selection_digest_is_stable_and_origin_sensitive() {
    let manual = SelectionRecord::v1(
        cycle(),
        emp("emp_a"),
        emp("emp_b"),
        SelectionOrigin::Manual,
        MonotonicTimeNs(700),
    )
    .unwrap();
    let random = SelectionRecord::v1(
        cycle(),
        emp("emp_a"),
        emp("emp_b"),
        SelectionOrigin::Random,
        MonotonicTimeNs(701),
    )
    .unwrap();
    assert_eq!(selection_digest_hex(&manual), selection_digest_hex(&manual));
    assert_ne!(selection_digest_hex(&manual), selection_digest_hex(&random));
    assert_eq!(selection_digest_hex(&manual).len(), 64);
}
