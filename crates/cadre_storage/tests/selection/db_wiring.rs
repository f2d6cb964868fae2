#![forbid(unsafe_code)]

use cadre_contracts::cycle::{CycleId, CycleStatus, ReviewCycleRecord};
use cadre_contracts::directory::{EmployeeId, EmployeeRecord, OrganizationId};
use cadre_contracts::selection::SelectionPolicy;
use cadre_contracts::MonotonicTimeNs;
use cadre_storage::review::{
    RegisterAttempt, ReviewStore, SelectionRejection, StorageError,
};

fn org() -> OrganizationId {
    OrganizationId::new("org_a").unwrap()
}

fn emp(id: &str) -> EmployeeId {
    EmployeeId::new(id).unwrap()
}

fn policy() -> SelectionPolicy {
    SelectionPolicy::mvp_v1()
}

fn employee(id: &str, active: bool) -> EmployeeRecord {
    EmployeeRecord::v1(
        emp(id),
        org(),
        format!("Employee {id}"),
        None,
        "Analyst".to_string(),
        "Operations".to_string(),
        3,
        None,
        active,
    )
    .unwrap()
}

/// Five active employees (emp_a..emp_e) and one collecting cycle. With the
/// mvp policy the eligible pool per evaluator is 4, so quota = 1 ... 2.
fn collecting_store(ids: &[&str]) -> (ReviewStore, CycleId) {
    let mut s = ReviewStore::new_in_memory();
    for id in ids {
        s.insert_employee(employee(id, true)).unwrap();
    }
    let cycle_id = CycleId::new("cycle_1").unwrap();
    s.insert_cycle(
        ReviewCycleRecord::v1(
            cycle_id.clone(),
            org(),
            "H1 behavioral review".to_string(),
            MonotonicTimeNs(1_000),
            MonotonicTimeNs(2_000),
            CycleStatus::Draft,
            emp(ids[0]),
            MonotonicTimeNs(500),
            MonotonicTimeNs(500),
        )
        .unwrap(),
    )
    .unwrap();
    s.transition_cycle(&cycle_id, CycleStatus::Collecting, MonotonicTimeNs(600))
        .unwrap();
    (s, cycle_id)
}

fn register(
    s: &mut ReviewStore,
    cycle_id: &CycleId,
    evaluator: &str,
    peer: &str,
    t: u64,
) -> RegisterAttempt {
    s.register_manual_selection(
        &policy(),
        MonotonicTimeNs(t),
        cycle_id,
        &emp(evaluator),
        &emp(peer),
    )
    .unwrap()
}

#[test]
fn at_selection_db_01_eligible_pool_excludes_evaluator_and_inactive() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c"]);
    s.insert_employee(employee("emp_gone", false)).unwrap();
    let pool = s.eligible_peers(&policy(), &cycle_id, &emp("emp_a")).unwrap();
    let ids: Vec<&str> = pool.iter().map(|p| p.peer_id.as_str()).collect();
    assert_eq!(ids, vec!["emp_b", "emp_c"]);
    assert!(pool.iter().all(|p| p.times_chosen == 0 && p.can_be_chosen));
}

#[test]
fn at_selection_db_02_accepted_selection_updates_projections() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]);
    let attempt = register(&mut s, &cycle_id, "emp_a", "emp_b", 700);
    assert!(matches!(attempt, RegisterAttempt::Accepted(_)));
    assert_eq!(s.times_chosen(&cycle_id, &emp("emp_b")), 1);
    assert_eq!(s.manual_count(&cycle_id, &emp("emp_a")), 1);
    assert_eq!(s.selection_rows().len(), 1);

    let pool = s.eligible_peers(&policy(), &cycle_id, &emp("emp_c")).unwrap();
    let b = pool.iter().find(|p| p.peer_id == emp("emp_b")).unwrap();
    assert_eq!(b.times_chosen, 1);
    assert!(b.can_be_chosen);
}

#[test]
fn at_selection_db_03_self_selection_is_rejected_as_data() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c"]);
    let attempt = register(&mut s, &cycle_id, "emp_a", "emp_a", 700);
    assert!(matches!(
        attempt,
        RegisterAttempt::Rejected(SelectionRejection::SelfSelection)
    ));
    assert!(s.selection_rows().is_empty());
}

#[test]
fn at_selection_db_04_duplicate_triple_is_rejected_as_data() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]);
    assert!(matches!(
        register(&mut s, &cycle_id, "emp_a", "emp_b", 700),
        RegisterAttempt::Accepted(_)
    ));
    assert!(matches!(
        register(&mut s, &cycle_id, "emp_a", "emp_b", 701),
        RegisterAttempt::Rejected(SelectionRejection::DuplicateSelection)
    ));
    assert_eq!(s.selection_rows().len(), 1);
}

#[test]
fn at_selection_db_05_last_cap_slot_goes_to_exactly_one_registrant() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]);
    // emp_b reaches cap-1 via emp_a, then emp_c and emp_d race for the last
    // slot; the store serializes them and the second sees the cap.
    assert!(matches!(
        register(&mut s, &cycle_id, "emp_a", "emp_b", 700),
        RegisterAttempt::Accepted(_)
    ));
    assert!(matches!(
        register(&mut s, &cycle_id, "emp_c", "emp_b", 701),
        RegisterAttempt::Accepted(_)
    ));
    let loser = register(&mut s, &cycle_id, "emp_d", "emp_b", 702);
    assert!(matches!(
        loser,
        RegisterAttempt::Rejected(SelectionRejection::PeerAtCap { times_chosen: 2 })
    ));
    assert_eq!(s.times_chosen(&cycle_id, &emp("emp_b")), 2);
}

#[test]
fn at_selection_db_06_quota_is_rederived_inside_the_write() {
    // Pool of 4 per evaluator -> quota (4+1)/3 = 1 with the mvp policy.
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]);
    assert!(matches!(
        register(&mut s, &cycle_id, "emp_a", "emp_b", 700),
        RegisterAttempt::Accepted(_)
    ));
    let attempt = register(&mut s, &cycle_id, "emp_a", "emp_c", 701);
    assert!(matches!(
        attempt,
        RegisterAttempt::Rejected(SelectionRejection::QuotaExhausted {
            quota: 1,
            manual_count: 1,
        })
    ));
}

#[test]
fn at_selection_db_07_register_requires_collecting_status() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c"]);
    s.transition_cycle(&cycle_id, CycleStatus::Closing, MonotonicTimeNs(650))
        .unwrap();
    let attempt = register(&mut s, &cycle_id, "emp_a", "emp_b", 700);
    assert!(matches!(
        attempt,
        RegisterAttempt::Rejected(SelectionRejection::CycleNotCollecting {
            status: CycleStatus::Closing,
        })
    ));

    s.transition_cycle(&cycle_id, CycleStatus::Completed, MonotonicTimeNs(660))
        .unwrap();
    let attempt = register(&mut s, &cycle_id, "emp_a", "emp_b", 701);
    assert!(matches!(
        attempt,
        RegisterAttempt::Rejected(SelectionRejection::CycleNotCollecting {
            status: CycleStatus::Completed,
        })
    ));
}

#[test]
fn at_selection_db_08_inactive_peer_is_not_eligible() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c"]);
    s.insert_employee(employee("emp_gone", false)).unwrap();
    let attempt = register(&mut s, &cycle_id, "emp_a", "emp_gone", 700);
    assert!(matches!(
        attempt,
        RegisterAttempt::Rejected(SelectionRejection::PeerNotEligible)
    ));
}

#[test]
fn at_selection_db_09_unknown_evaluator_is_a_foreign_key_violation() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c"]);
    let out = s.register_manual_selection(
        &policy(),
        MonotonicTimeNs(700),
        &cycle_id,
        &emp("emp_ghost"),
        &emp("emp_b"),
    );
    assert!(matches!(
        out,
        Err(StorageError::ForeignKeyViolation {
            table: "employees",
            ..
        })
    ));
}

#[test]
fn at_selection_db_10_random_rows_require_closing_cycle() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c"]);
    let out = s.append_random_selection(
        &policy(),
        MonotonicTimeNs(700),
        &cycle_id,
        &emp("emp_a"),
        &emp("emp_b"),
    );
    assert!(matches!(out, Err(StorageError::ContractViolation(_))));

    s.transition_cycle(&cycle_id, CycleStatus::Closing, MonotonicTimeNs(750))
        .unwrap();
    let record = s
        .append_random_selection(
            &policy(),
            MonotonicTimeNs(800),
            &cycle_id,
            &emp("emp_a"),
            &emp("emp_b"),
        )
        .unwrap();
    assert_eq!(record.peer_id, emp("emp_b"));
    assert_eq!(s.times_chosen(&cycle_id, &emp("emp_b")), 1);
    // Random rows do not count against the manual quota.
    assert_eq!(s.manual_count(&cycle_id, &emp("emp_a")), 0);
}

#[test]
fn at_selection_db_11_rebuilt_projections_match_incremental_ones() {
    let (mut s, cycle_id) = collecting_store(&["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]);
    register(&mut s, &cycle_id, "emp_a", "emp_b", 700);
    register(&mut s, &cycle_id, "emp_c", "emp_b", 701);
    register(&mut s, &cycle_id, "emp_d", "emp_e", 702);

    let times_before: Vec<u32> = ["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]
        .iter()
        .map(|id| s.times_chosen(&cycle_id, &emp(id)))
        .collect();
    let manual_before: Vec<u32> = ["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]
        .iter()
        .map(|id| s.manual_count(&cycle_id, &emp(id)))
        .collect();

    s.rebuild_selection_projections();

    let times_after: Vec<u32> = ["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]
        .iter()
        .map(|id| s.times_chosen(&cycle_id, &emp(id)))
        .collect();
    let manual_after: Vec<u32> = ["emp_a", "emp_b", "emp_c", "emp_d", "emp_e"]
        .iter()
        .map(|id| s.manual_count(&cycle_id, &emp(id)))
        .collect();

    assert_eq!(times_before, times_after);
    assert_eq!(manual_before, manual_after);
}
