#![forbid(unsafe_code)]

use cadre_contracts::cycle::{CycleId, CycleStatus, ReviewCycleRecord};
use cadre_contracts::directory::{EmployeeId, EmployeeRecord, OrganizationId};
use cadre_contracts::{ContractViolation, MonotonicTimeNs};
use cadre_storage::review::{ReviewStore, StorageError};

fn org(id: &str) -> OrganizationId {
    OrganizationId::new(id).unwrap()
}

fn emp(id: &str) -> EmployeeId {
    EmployeeId::new(id).unwrap()
}

fn employee(id: &str, organization: &str, manager: Option<&str>, active: bool) -> EmployeeRecord {
    EmployeeRecord::v1(
        emp(id),
        org(organization),
        format!("Employee {id}"),
        Some(format!("{id}@example.com")),
        "Analyst".to_string(),
        "Operations".to_string(),
        3,
        manager.map(emp),
        active,
    )
    .unwrap()
}

fn draft_cycle(id: &str, organization: &str) -> ReviewCycleRecord {
    ReviewCycleRecord::v1(
        CycleId::new(id).unwrap(),
        org(organization),
        "H1 behavioral review".to_string(),
        MonotonicTimeNs(1_000),
        MonotonicTimeNs(2_000),
        CycleStatus::Draft,
        emp("emp_admin"),
        MonotonicTimeNs(500),
        MonotonicTimeNs(500),
    )
    .unwrap()
}

#[test]
fn at_review_core_db_01_duplicate_employee_is_rejected() {
    let mut s = ReviewStore::new_in_memory();
    s.insert_employee(employee("emp_1", "org_a", None, true))
        .unwrap();
    assert!(matches!(
        s.insert_employee(employee("emp_1", "org_a", None, true)),
        Err(StorageError::DuplicateKey {
            table: "employees",
            ..
        })
    ));
}

#[test]
fn at_review_core_db_02_same_employee_id_across_orgs_is_distinct() {
    let mut s = ReviewStore::new_in_memory();
    s.insert_employee(employee("emp_1", "org_a", None, true))
        .unwrap();
    s.insert_employee(employee("emp_1", "org_b", None, true))
        .unwrap();
    assert!(s.employee_row(&org("org_a"), &emp("emp_1")).is_some());
    assert!(s.employee_row(&org("org_b"), &emp("emp_1")).is_some());
}

#[test]
fn at_review_core_db_03_active_roster_filters_inactive_rows() {
    let mut s = ReviewStore::new_in_memory();
    s.insert_employee(employee("emp_1", "org_a", None, true))
        .unwrap();
    s.insert_employee(employee("emp_2", "org_a", None, false))
        .unwrap();
    s.insert_employee(employee("emp_3", "org_b", None, true))
        .unwrap();
    let roster = s.active_roster(&org("org_a"));
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].employee_id, emp("emp_1"));
}

#[test]
fn at_review_core_db_04_cycles_are_created_in_draft_only() {
    let mut s = ReviewStore::new_in_memory();
    let mut record = draft_cycle("cycle_1", "org_a");
    record.status = CycleStatus::Collecting;
    assert!(matches!(
        s.insert_cycle(record),
        Err(StorageError::ContractViolation(
            ContractViolation::InvalidValue {
                field: "review_cycles.status",
                ..
            }
        ))
    ));
}

#[test]
fn at_review_core_db_05_transitions_are_one_way_and_ledgered() {
    let mut s = ReviewStore::new_in_memory();
    let cycle_id = CycleId::new("cycle_1").unwrap();
    s.insert_cycle(draft_cycle("cycle_1", "org_a")).unwrap();

    s.transition_cycle(&cycle_id, CycleStatus::Collecting, MonotonicTimeNs(600))
        .unwrap();
    s.transition_cycle(&cycle_id, CycleStatus::Closing, MonotonicTimeNs(700))
        .unwrap();
    s.transition_cycle(&cycle_id, CycleStatus::Completed, MonotonicTimeNs(800))
        .unwrap();

    assert!(matches!(
        s.transition_cycle(&cycle_id, CycleStatus::Collecting, MonotonicTimeNs(900)),
        Err(StorageError::ContractViolation(_))
    ));

    let transitions = s.cycle_transition_rows();
    assert_eq!(transitions.len(), 3);
    assert_eq!(transitions[0].from, CycleStatus::Draft);
    assert_eq!(transitions[2].to, CycleStatus::Completed);
    assert_eq!(
        s.cycle_row(&cycle_id).unwrap().status,
        CycleStatus::Completed
    );
    assert_eq!(s.cycle_row(&cycle_id).unwrap().updated_at, MonotonicTimeNs(800));
}

#[test]
fn at_review_core_db_06_skipping_a_phase_is_rejected() {
    let mut s = ReviewStore::new_in_memory();
    let cycle_id = CycleId::new("cycle_1").unwrap();
    s.insert_cycle(draft_cycle("cycle_1", "org_a")).unwrap();
    assert!(matches!(
        s.transition_cycle(&cycle_id, CycleStatus::Closing, MonotonicTimeNs(600)),
        Err(StorageError::ContractViolation(_))
    ));
    assert!(matches!(
        s.transition_cycle(&cycle_id, CycleStatus::Completed, MonotonicTimeNs(600)),
        Err(StorageError::ContractViolation(_))
    ));
}

#[test]
fn at_review_core_db_08_cycle_deletion_cascades_to_dependent_rows() {
    use cadre_contracts::selection::SelectionPolicy;

    let mut s = ReviewStore::new_in_memory();
    for id in ["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"] {
        s.insert_employee(employee(id, "org_a", None, true)).unwrap();
    }
    let cycle_id = CycleId::new("cycle_1").unwrap();
    s.insert_cycle(draft_cycle("cycle_1", "org_a")).unwrap();
    s.transition_cycle(&cycle_id, CycleStatus::Collecting, MonotonicTimeNs(600))
        .unwrap();
    s.register_manual_selection(
        &SelectionPolicy::mvp_v1(),
        MonotonicTimeNs(700),
        &cycle_id,
        &emp("emp_a"),
        &emp("emp_b"),
    )
    .unwrap();

    s.delete_cycle(&cycle_id).unwrap();

    assert!(s.cycle_row(&cycle_id).is_none());
    assert!(s.cycle_transition_rows().is_empty());
    assert!(s.selection_rows().is_empty());
    assert_eq!(s.times_chosen(&cycle_id, &emp("emp_b")), 0);
    assert!(matches!(
        s.delete_cycle(&cycle_id),
        Err(StorageError::ForeignKeyViolation {
            table: "review_cycles",
            ..
        })
    ));
}

#[test]
fn at_review_core_db_07_unknown_cycle_is_a_foreign_key_violation() {
    let mut s = ReviewStore::new_in_memory();
    assert!(matches!(
        s.transition_cycle(
            &CycleId::new("cycle_missing").unwrap(),
            CycleStatus::Collecting,
            MonotonicTimeNs(600)
        ),
        Err(StorageError::ForeignKeyViolation {
            table: "review_cycles",
            ..
        })
    ));
}
