#![forbid(unsafe_code)]

use crate::directory::{EmployeeId, OrganizationId};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const CYCLE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

fn validate_id(field: &'static str, s: &str, max_len: usize) -> Result<(), ContractViolation> {
    if s.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if s.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "too long",
        });
    }
    if !s.is_ascii() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be ASCII",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleId(String);

impl CycleId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for CycleId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("cycle_id", &self.0, 64)
    }
}

/// One-way lifecycle. `Closing` is entered when voluntary selection ends and
/// the random-fill batch starts; `Completed` once assessments materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CycleStatus {
    Draft,
    Collecting,
    Closing,
    Completed,
}

pub fn is_allowed_cycle_transition(from: CycleStatus, to: CycleStatus) -> bool {
    matches!(
        (from, to),
        (CycleStatus::Draft, CycleStatus::Collecting)
            | (CycleStatus::Collecting, CycleStatus::Closing)
            | (CycleStatus::Closing, CycleStatus::Completed)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCycleRecord {
    pub schema_version: SchemaVersion,
    pub cycle_id: CycleId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub starts_at: MonotonicTimeNs,
    pub ends_at: MonotonicTimeNs,
    pub status: CycleStatus,
    pub created_by: EmployeeId,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

impl ReviewCycleRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        cycle_id: CycleId,
        organization_id: OrganizationId,
        name: String,
        starts_at: MonotonicTimeNs,
        ends_at: MonotonicTimeNs,
        status: CycleStatus,
        created_by: EmployeeId,
        created_at: MonotonicTimeNs,
        updated_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: CYCLE_CONTRACT_VERSION,
            cycle_id,
            organization_id,
            name,
            starts_at,
            ends_at,
            status,
            created_by,
            created_at,
            updated_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for ReviewCycleRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CYCLE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "review_cycle_record.schema_version",
                reason: "must match CYCLE_CONTRACT_VERSION",
            });
        }
        self.cycle_id.validate()?;
        self.organization_id.validate()?;
        if self.name.trim().is_empty() || self.name.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "review_cycle_record.name",
                reason: "must be 1..=128 chars",
            });
        }
        if self.ends_at.0 <= self.starts_at.0 {
            return Err(ContractViolation::InvalidValue {
                field: "review_cycle_record.ends_at",
                reason: "must be after starts_at",
            });
        }
        self.created_by.validate()?;
        if self.updated_at.0 < self.created_at.0 {
            return Err(ContractViolation::InvalidValue {
                field: "review_cycle_record.updated_at",
                reason: "must be >= created_at",
            });
        }
        Ok(())
    }
}

/// Ledger row recording one lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTransitionEvent {
    pub schema_version: SchemaVersion,
    pub event_id: u64,
    pub cycle_id: CycleId,
    pub from: CycleStatus,
    pub to: CycleStatus,
    pub occurred_at: MonotonicTimeNs,
}

impl Validate for CycleTransitionEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CYCLE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "cycle_transition_event.schema_version",
                reason: "must match CYCLE_CONTRACT_VERSION",
            });
        }
        if self.event_id == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "cycle_transition_event.event_id",
                reason: "must be > 0",
            });
        }
        self.cycle_id.validate()?;
        if !is_allowed_cycle_transition(self.from, self.to) {
            return Err(ContractViolation::InvalidValue {
                field: "cycle_transition_event.to",
                reason: "transition not allowed",
            });
        }
        Ok(())
    }
}
