#![forbid(unsafe_code)]

use serde::Serialize;

use crate::cycle::CycleId;
use crate::directory::EmployeeId;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const ASSESSMENT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssessmentKind {
    Hierarchical,
    Peer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssessmentStatus {
    Pending,
    InProgress,
    Completed,
}

/// Persisted evaluation task produced by the materializer. Response
/// collection happens in the out-of-scope UI layer; the engine only tracks
/// the task's existence and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentRecord {
    pub schema_version: SchemaVersion,
    pub cycle_id: CycleId,
    pub evaluator_id: EmployeeId,
    pub evaluatee_id: EmployeeId,
    pub kind: AssessmentKind,
    pub status: AssessmentStatus,
    pub created_at: MonotonicTimeNs,
    pub completed_at: Option<MonotonicTimeNs>,
}

impl AssessmentRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        cycle_id: CycleId,
        evaluator_id: EmployeeId,
        evaluatee_id: EmployeeId,
        kind: AssessmentKind,
        status: AssessmentStatus,
        created_at: MonotonicTimeNs,
        completed_at: Option<MonotonicTimeNs>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ASSESSMENT_CONTRACT_VERSION,
            cycle_id,
            evaluator_id,
            evaluatee_id,
            kind,
            status,
            created_at,
            completed_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for AssessmentRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ASSESSMENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "assessment_record.schema_version",
                reason: "must match ASSESSMENT_CONTRACT_VERSION",
            });
        }
        self.cycle_id.validate()?;
        self.evaluator_id.validate()?;
        self.evaluatee_id.validate()?;
        if self.evaluator_id == self.evaluatee_id {
            return Err(ContractViolation::InvalidValue {
                field: "assessment_record.evaluatee_id",
                reason: "must differ from evaluator_id",
            });
        }
        match (self.status, self.completed_at) {
            (AssessmentStatus::Completed, None) => {
                return Err(ContractViolation::InvalidValue {
                    field: "assessment_record.completed_at",
                    reason: "must be set when status=Completed",
                });
            }
            (AssessmentStatus::Pending | AssessmentStatus::InProgress, Some(_)) => {
                return Err(ContractViolation::InvalidValue {
                    field: "assessment_record.completed_at",
                    reason: "must be unset before completion",
                });
            }
            _ => {}
        }
        Ok(())
    }
}

/// Batch result of one materializer run over a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaterializeReport {
    pub hierarchical_assessments: u32,
    pub peer_assessments: u32,
    pub total_assessments: u32,
}

impl Validate for MaterializeReport {
    fn validate(&self) -> Result<(), ContractViolation> {
        let sum = self.hierarchical_assessments as u64 + self.peer_assessments as u64;
        if sum != self.total_assessments as u64 {
            return Err(ContractViolation::InvalidValue {
                field: "materialize_report.total_assessments",
                reason: "must equal hierarchical + peer",
            });
        }
        Ok(())
    }
}
