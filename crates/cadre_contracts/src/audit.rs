#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crate::directory::{EmployeeId, OrganizationId};
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};

pub const AUDIT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationId(pub u128);

impl Validate for CorrelationId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "correlation_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnId(pub u64);

impl Validate for TurnId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "turn_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuditEventId(pub u64);

impl Validate for AuditEventId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_event_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditComponent {
    TraitScorer,
    Eligibility,
    Registrar,
    RandomFill,
    Materializer,
    CycleLifecycle,
    Other(String),
}

impl Validate for AuditComponent {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let AuditComponent::Other(s) = self {
            if s.trim().is_empty() {
                return Err(ContractViolation::InvalidValue {
                    field: "audit_component.other",
                    reason: "must not be empty",
                });
            }
            if s.len() > 64 {
                return Err(ContractViolation::InvalidValue {
                    field: "audit_component.other",
                    reason: "must be <= 64 chars",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEventType {
    StateTransition,
    SelectionAccepted,
    SelectionRejected,
    RandomFillCompleted,
    AssessmentsMaterialized,
    ScoreFinalized,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditSeverity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PayloadKey(String);

fn is_ascii_lower_snake_key(s: &str) -> bool {
    let b = s.as_bytes();
    if b.is_empty() {
        return false;
    }
    if !b[0].is_ascii_lowercase() {
        return false;
    }
    for &c in b.iter().skip(1) {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == b'_') {
            return false;
        }
    }
    true
}

impl PayloadKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ContractViolation> {
        let key = key.into();
        if key.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "payload_key",
                reason: "must be <= 64 chars",
            });
        }
        if !is_ascii_lower_snake_key(&key) {
            return Err(ContractViolation::InvalidValue {
                field: "payload_key",
                reason: "must be lower_snake_case (a-z0-9_)",
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for PayloadKey {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "payload_key",
                reason: "must be <= 64 chars",
            });
        }
        if !is_ascii_lower_snake_key(&self.0) {
            return Err(ContractViolation::InvalidValue {
                field: "payload_key",
                reason: "must be lower_snake_case (a-z0-9_)",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadValue(String);

impl PayloadValue {
    pub fn new(value: impl Into<String>) -> Result<Self, ContractViolation> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "payload_value",
                reason: "must not be empty",
            });
        }
        if value.len() > 256 {
            return Err(ContractViolation::InvalidValue {
                field: "payload_value",
                reason: "must be <= 256 chars",
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for PayloadValue {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "payload_value",
                reason: "must not be empty",
            });
        }
        if self.0.len() > 256 {
            return Err(ContractViolation::InvalidValue {
                field: "payload_value",
                reason: "must be <= 256 chars",
            });
        }
        Ok(())
    }
}

/// Bounded key/value payload; enough for counters and state names, never a
/// dumping ground for full records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPayload {
    pub schema_version: SchemaVersion,
    pub entries: BTreeMap<PayloadKey, PayloadValue>,
}

impl AuditPayload {
    pub fn empty_v1() -> Self {
        Self {
            schema_version: AUDIT_CONTRACT_VERSION,
            entries: BTreeMap::new(),
        }
    }

    pub fn v1(entries: BTreeMap<PayloadKey, PayloadValue>) -> Result<Self, ContractViolation> {
        let p = Self {
            schema_version: AUDIT_CONTRACT_VERSION,
            entries,
        };
        p.validate()?;
        Ok(p)
    }
}

impl Validate for AuditPayload {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != AUDIT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "audit_payload.schema_version",
                reason: "must match AUDIT_CONTRACT_VERSION",
            });
        }
        if self.entries.len() > 16 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_payload.entries",
                reason: "must be <= 16 entries",
            });
        }
        let mut total_bytes: usize = 0;
        for (k, v) in &self.entries {
            k.validate()?;
            v.validate()?;
            total_bytes = total_bytes.saturating_add(k.as_str().len());
            total_bytes = total_bytes.saturating_add(v.as_str().len());
            if total_bytes > 2048 {
                return Err(ContractViolation::InvalidValue {
                    field: "audit_payload",
                    reason: "total payload size must be <= 2048 bytes",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEventInput {
    pub schema_version: SchemaVersion,
    pub created_at: MonotonicTimeNs,
    pub organization_id: Option<OrganizationId>,
    pub cycle_ref: Option<String>,
    pub actor_id: Option<EmployeeId>,
    pub component: AuditComponent,
    pub event_type: AuditEventType,
    pub reason_code: ReasonCodeId,
    pub severity: AuditSeverity,
    pub correlation_id: CorrelationId,
    pub turn_id: TurnId,
    pub payload: AuditPayload,
    /// Optional key to detect duplicate emissions deterministically.
    pub idempotency_key: Option<String>,
}

impl AuditEventInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        created_at: MonotonicTimeNs,
        organization_id: Option<OrganizationId>,
        cycle_ref: Option<String>,
        actor_id: Option<EmployeeId>,
        component: AuditComponent,
        event_type: AuditEventType,
        reason_code: ReasonCodeId,
        severity: AuditSeverity,
        correlation_id: CorrelationId,
        turn_id: TurnId,
        payload: AuditPayload,
        idempotency_key: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let e = Self {
            schema_version: AUDIT_CONTRACT_VERSION,
            created_at,
            organization_id,
            cycle_ref,
            actor_id,
            component,
            event_type,
            reason_code,
            severity,
            correlation_id,
            turn_id,
            payload,
            idempotency_key,
        };
        e.validate()?;
        Ok(e)
    }
}

impl Validate for AuditEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != AUDIT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "audit_event_input.schema_version",
                reason: "must match AUDIT_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_event_input.created_at",
                reason: "must be > 0",
            });
        }
        if let Some(org) = &self.organization_id {
            org.validate()?;
        }
        if let Some(cycle_ref) = &self.cycle_ref {
            if cycle_ref.trim().is_empty() || cycle_ref.len() > 64 {
                return Err(ContractViolation::InvalidValue {
                    field: "audit_event_input.cycle_ref",
                    reason: "must be 1..=64 chars when provided",
                });
            }
        }
        if let Some(actor) = &self.actor_id {
            actor.validate()?;
        }
        self.component.validate()?;
        self.correlation_id.validate()?;
        self.turn_id.validate()?;
        self.payload.validate()?;
        if let Some(key) = &self.idempotency_key {
            if key.trim().is_empty() || key.len() > 128 {
                return Err(ContractViolation::InvalidValue {
                    field: "audit_event_input.idempotency_key",
                    reason: "must be 1..=128 chars when provided",
                });
            }
        }
        Ok(())
    }
}

/// Persisted audit row; identical to the input plus the assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub event_id: AuditEventId,
    pub input: AuditEventInput,
}

impl Validate for AuditEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.event_id.validate()?;
        self.input.validate()
    }
}
