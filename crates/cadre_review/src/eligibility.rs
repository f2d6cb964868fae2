#![forbid(unsafe_code)]

use cadre_contracts::cycle::CycleId;
use cadre_contracts::directory::EmployeeId;
use cadre_contracts::selection::{EligiblePeer, SelectionPolicy, SelectionQuota};
use cadre_contracts::ContractViolation;
use cadre_engines::quota::QuotaRuntime;
use cadre_storage::review::{ReviewStore, StorageError};

/// Read path of the selection flow: who may this evaluator still choose,
/// and how many more choices are expected. Both projections recompute from
/// current rows on every call; neither mutates anything. The registrar
/// re-validates everything inside its own write, so acting on a stale read
/// can only produce a rejection there.
#[derive(Debug, Clone)]
pub struct EligibilityRuntime {
    policy: SelectionPolicy,
    quota: QuotaRuntime,
}

impl EligibilityRuntime {
    pub fn new(policy: SelectionPolicy) -> Result<Self, ContractViolation> {
        let quota = QuotaRuntime::new(policy)?;
        Ok(Self { policy, quota })
    }

    pub fn eligible_peers(
        &self,
        store: &ReviewStore,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
    ) -> Result<Vec<EligiblePeer>, StorageError> {
        store.eligible_peers(&self.policy, cycle_id, evaluator_id)
    }

    pub fn quota(
        &self,
        store: &ReviewStore,
        cycle_id: &CycleId,
        evaluator_id: &EmployeeId,
    ) -> Result<SelectionQuota, StorageError> {
        let pool = store.eligible_peers(&self.policy, cycle_id, evaluator_id)?;
        let manual_count = store.manual_count(cycle_id, evaluator_id);
        Ok(self.quota.project(pool.len() as u32, manual_count))
    }
}
