#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

use cadre_contracts::cycle::CycleId;
use cadre_contracts::directory::EmployeeId;
use cadre_contracts::selection::{EligiblePeer, SelectionPolicy};
use cadre_contracts::{ContractViolation, Validate};

/// Cap-respecting random draw for one evaluator. The caller owns pool
/// freshness: it must re-fetch eligibility immediately before each draw so
/// that earlier fills are reflected in `can_be_chosen`.
#[derive(Debug, Clone)]
pub struct FillRuntime {
    policy: SelectionPolicy,
}

impl FillRuntime {
    pub fn new(policy: SelectionPolicy) -> Result<Self, ContractViolation> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Draw up to `remaining` distinct peers for `evaluator_id`, without
    /// replacement, from the still-choosable part of the pool. Returns fewer
    /// than `remaining` ids when the pool is exhausted; the caller reports
    /// that shortfall instead of failing the batch.
    pub fn draw<R: Rng>(
        &self,
        rng: &mut R,
        evaluator_id: &EmployeeId,
        pool: &[EligiblePeer],
        already_chosen: &BTreeSet<EmployeeId>,
        remaining: u32,
    ) -> Vec<EmployeeId> {
        if remaining == 0 {
            return Vec::new();
        }
        let candidates: Vec<&EligiblePeer> = pool
            .iter()
            .filter(|peer| {
                peer.can_be_chosen
                    && peer.times_chosen < self.policy.peer_cap
                    && peer.peer_id != *evaluator_id
                    && !already_chosen.contains(&peer.peer_id)
            })
            .collect();
        candidates
            .choose_multiple(rng, remaining as usize)
            .map(|peer| peer.peer_id.clone())
            .collect()
    }
}

/// Deterministic draw seed for one closure run. Re-running a crashed closure
/// with the same salt replays the same draw sequence against whatever
/// selections already committed.
pub fn fill_seed(cycle_id: &CycleId, salt: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(cycle_id.as_str().as_bytes());
    hasher.update(salt.to_le_bytes());
    hasher.finalize().into()
}
