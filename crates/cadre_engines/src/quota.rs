#![forbid(unsafe_code)]

use cadre_contracts::selection::{SelectionPolicy, SelectionQuota};
use cadre_contracts::{ContractViolation, Validate};

/// Read-only quota projection. Never mutates state; the registrar re-derives
/// the same numbers inside its own transaction before trusting them.
#[derive(Debug, Clone)]
pub struct QuotaRuntime {
    policy: SelectionPolicy,
}

impl QuotaRuntime {
    pub fn new(policy: SelectionPolicy) -> Result<Self, ContractViolation> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn quota_for(&self, peer_count: u32) -> u32 {
        self.policy.quota_for(peer_count)
    }

    pub fn project(&self, peer_count: u32, manual_count: u32) -> SelectionQuota {
        let quota = self.quota_for(peer_count);
        SelectionQuota {
            peer_count,
            quota,
            manual_count,
            remaining: quota.saturating_sub(manual_count),
        }
    }
}
