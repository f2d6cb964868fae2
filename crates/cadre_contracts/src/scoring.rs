#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::Serialize;

use crate::directory::EmployeeId;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const SCORING_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

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

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AxisId(String);

impl AxisId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for AxisId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("axis_id", &self.0, 64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for InstrumentId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("instrument_id", &self.0, 64)
    }
}

/// Natural = self-perception, Adapted = perceived workplace-adapted
/// behavior. Single-block instruments score every response into Natural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Block {
    Natural,
    Adapted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockMode {
    Single,
    Dual,
}

/// Instrument definition. The `axes` vector is the declared axis priority
/// order: rank ties are broken by position in this list, never by map
/// iteration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSpec {
    pub schema_version: SchemaVersion,
    pub instrument_id: InstrumentId,
    pub axes: Vec<AxisId>,
    pub block_mode: BlockMode,
}

impl InstrumentSpec {
    pub fn v1(
        instrument_id: InstrumentId,
        axes: Vec<AxisId>,
        block_mode: BlockMode,
    ) -> Result<Self, ContractViolation> {
        let s = Self {
            schema_version: SCORING_CONTRACT_VERSION,
            instrument_id,
            axes,
            block_mode,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn axis_priority(&self, axis: &AxisId) -> Option<usize> {
        self.axes.iter().position(|a| a == axis)
    }
}

impl Validate for InstrumentSpec {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != SCORING_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "instrument_spec.schema_version",
                reason: "must match SCORING_CONTRACT_VERSION",
            });
        }
        self.instrument_id.validate()?;
        if self.axes.len() < 2 || self.axes.len() > 32 {
            return Err(ContractViolation::InvalidRange {
                field: "instrument_spec.axes",
                min: 2,
                max: 32,
                got: self.axes.len() as u64,
            });
        }
        for axis in &self.axes {
            axis.validate()?;
        }
        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[i + 1..].contains(axis) {
                return Err(ContractViolation::InvalidValue {
                    field: "instrument_spec.axes",
                    reason: "must not contain duplicate axis ids",
                });
            }
        }
        Ok(())
    }
}

/// Raw scorer input. `axis_ref` is resolved against the owning instrument's
/// axis list at scoring time; an unresolvable ref contributes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitResponse {
    pub schema_version: SchemaVersion,
    pub axis_ref: String,
    pub block: Block,
    pub recorded_at: MonotonicTimeNs,
}

impl TraitResponse {
    pub fn v1(
        axis_ref: impl Into<String>,
        block: Block,
        recorded_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: SCORING_CONTRACT_VERSION,
            axis_ref: axis_ref.into(),
            block,
            recorded_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for TraitResponse {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != SCORING_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "trait_response.schema_version",
                reason: "must match SCORING_CONTRACT_VERSION",
            });
        }
        validate_id("trait_response.axis_ref", &self.axis_ref, 64)?;
        if self.recorded_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "trait_response.recorded_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

pub type AxisScores = BTreeMap<AxisId, u32>;

/// Derived scoring output. Serialized by the caller for persistence; the
/// engine itself never stores it outside the owning assessment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraitScoreResult {
    pub instrument_id: InstrumentId,
    pub natural: AxisScores,
    pub adapted: Option<AxisScores>,
    pub gaps: Option<AxisScores>,
    pub primary: Option<AxisId>,
    pub secondary: Option<AxisId>,
    pub skipped_responses: u32,
}

impl Validate for TraitScoreResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.instrument_id.validate()?;
        if self.adapted.is_some() != self.gaps.is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "trait_score_result.gaps",
                reason: "must be present exactly when adapted is present",
            });
        }
        if self.primary.is_none() && self.secondary.is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "trait_score_result.secondary",
                reason: "must be absent without a primary",
            });
        }
        if let (Some(p), Some(s)) = (&self.primary, &self.secondary) {
            if p == s {
                return Err(ContractViolation::InvalidValue {
                    field: "trait_score_result.secondary",
                    reason: "must differ from primary",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrumentAssessmentId(pub u64);

impl Validate for InstrumentAssessmentId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "instrument_assessment_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstrumentAssessmentStatus {
    InProgress,
    Completed,
}

/// Lifecycle row for one instrument run (a PI/Color-style questionnaire
/// taken by one subject). Responses accumulate while `InProgress`; the row
/// freezes with its score at completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentAssessmentRecord {
    pub schema_version: SchemaVersion,
    pub assessment_id: InstrumentAssessmentId,
    pub subject_id: EmployeeId,
    pub instrument_id: InstrumentId,
    pub status: InstrumentAssessmentStatus,
    pub score_result: Option<TraitScoreResult>,
    pub created_at: MonotonicTimeNs,
    pub completed_at: Option<MonotonicTimeNs>,
}

impl Validate for InstrumentAssessmentRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != SCORING_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "instrument_assessment_record.schema_version",
                reason: "must match SCORING_CONTRACT_VERSION",
            });
        }
        self.assessment_id.validate()?;
        self.subject_id.validate()?;
        self.instrument_id.validate()?;
        match self.status {
            InstrumentAssessmentStatus::InProgress => {
                if self.score_result.is_some() || self.completed_at.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "instrument_assessment_record.status",
                        reason: "in-progress rows must not carry a score or completion time",
                    });
                }
            }
            InstrumentAssessmentStatus::Completed => {
                if self.score_result.is_none() || self.completed_at.is_none() {
                    return Err(ContractViolation::InvalidValue {
                        field: "instrument_assessment_record.status",
                        reason: "completed rows must carry a score and completion time",
                    });
                }
            }
        }
        if let Some(result) = &self.score_result {
            result.validate()?;
        }
        Ok(())
    }
}
