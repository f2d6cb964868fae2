#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cadre_contracts::scoring::{
    AxisId, AxisScores, Block, BlockMode, InstrumentSpec, TraitResponse, TraitScoreResult,
    SCORING_CONTRACT_VERSION,
};
use cadre_contracts::{ContractViolation, ReasonCodeId, SchemaVersion, Validate};

pub mod reason_codes {
    use cadre_contracts::ReasonCodeId;

    // Trait-scorer reason-code namespace.
    pub const TRAIT_SCORE_OK: ReasonCodeId = ReasonCodeId(0x5453_0001);

    pub const TRAIT_SCORE_INPUT_SCHEMA_INVALID: ReasonCodeId = ReasonCodeId(0x5453_00F1);
    pub const TRAIT_SCORE_RESPONSE_LIMIT_EXCEEDED: ReasonCodeId = ReasonCodeId(0x5453_00F2);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraitScorerConfig {
    pub max_responses: u32,
}

impl TraitScorerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_responses: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRequest {
    pub schema_version: SchemaVersion,
    pub instrument: InstrumentSpec,
    pub responses: Vec<TraitResponse>,
}

impl ScoreRequest {
    pub fn v1(
        instrument: InstrumentSpec,
        responses: Vec<TraitResponse>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: SCORING_CONTRACT_VERSION,
            instrument,
            responses,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for ScoreRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != SCORING_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "score_request.schema_version",
                reason: "must match SCORING_CONTRACT_VERSION",
            });
        }
        self.instrument.validate()?;
        for response in &self.responses {
            response.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOk {
    pub reason_code: ReasonCodeId,
    pub result: TraitScoreResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRefuse {
    pub reason_code: ReasonCodeId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreResponse {
    Ok(ScoreOk),
    Refuse(ScoreRefuse),
}

/// Pure aggregation over one assessment's response set. No I/O; callers
/// persist the result and flip the assessment status themselves.
#[derive(Debug, Clone)]
pub struct TraitScorerRuntime {
    config: TraitScorerConfig,
}

impl TraitScorerRuntime {
    pub fn new(config: TraitScorerConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, req: &ScoreRequest) -> ScoreResponse {
        if req.validate().is_err() {
            return self.refuse(
                reason_codes::TRAIT_SCORE_INPUT_SCHEMA_INVALID,
                "score request failed contract validation",
            );
        }
        if req.responses.len() as u64 > self.config.max_responses as u64 {
            return self.refuse(
                reason_codes::TRAIT_SCORE_RESPONSE_LIMIT_EXCEEDED,
                "response set exceeds configured max_responses",
            );
        }

        let mut natural = zero_scores(&req.instrument.axes);
        let mut adapted = match req.instrument.block_mode {
            BlockMode::Dual => Some(zero_scores(&req.instrument.axes)),
            BlockMode::Single => None,
        };
        let mut skipped: u32 = 0;

        for response in &req.responses {
            let Some(axis) = resolve_axis(&req.instrument, &response.axis_ref) else {
                skipped += 1;
                continue;
            };
            match (response.block, adapted.as_mut()) {
                (Block::Natural, _) => {
                    bump(&mut natural, &axis);
                }
                (Block::Adapted, Some(adapted)) => {
                    bump(adapted, &axis);
                }
                // Adapted response against a single-block instrument
                // contributes nothing, same as an unknown axis.
                (Block::Adapted, None) => {
                    skipped += 1;
                }
            }
        }

        let gaps = adapted.as_ref().map(|adapted| {
            req.instrument
                .axes
                .iter()
                .map(|axis| {
                    let n = natural.get(axis).copied().unwrap_or(0);
                    let a = adapted.get(axis).copied().unwrap_or(0);
                    (axis.clone(), n.abs_diff(a))
                })
                .collect::<AxisScores>()
        });

        let ranked = rank_axes(&req.instrument, &natural);
        let result = TraitScoreResult {
            instrument_id: req.instrument.instrument_id.clone(),
            natural,
            adapted,
            gaps,
            primary: ranked.first().cloned(),
            secondary: ranked.get(1).cloned(),
            skipped_responses: skipped,
        };

        ScoreResponse::Ok(ScoreOk {
            reason_code: reason_codes::TRAIT_SCORE_OK,
            result,
        })
    }

    fn refuse(&self, reason_code: ReasonCodeId, message: &'static str) -> ScoreResponse {
        ScoreResponse::Refuse(ScoreRefuse {
            reason_code,
            message: message.to_string(),
        })
    }
}

fn zero_scores(axes: &[AxisId]) -> AxisScores {
    axes.iter().map(|axis| (axis.clone(), 0)).collect()
}

fn resolve_axis(instrument: &InstrumentSpec, axis_ref: &str) -> Option<AxisId> {
    instrument
        .axes
        .iter()
        .find(|axis| axis.as_str() == axis_ref)
        .cloned()
}

fn bump(scores: &mut BTreeMap<AxisId, u32>, axis: &AxisId) {
    if let Some(count) = scores.get_mut(axis) {
        *count += 1;
    }
}

/// Rank descending by count; equal counts fall back to the instrument's
/// declared axis order, never map iteration order.
fn rank_axes(instrument: &InstrumentSpec, scores: &AxisScores) -> Vec<AxisId> {
    let mut ranked: Vec<AxisId> = instrument.axes.clone();
    ranked.sort_by(|a, b| {
        let count_a = scores.get(a).copied().unwrap_or(0);
        let count_b = scores.get(b).copied().unwrap_or(0);
        count_b.cmp(&count_a).then_with(|| {
            instrument
                .axis_priority(a)
                .cmp(&instrument.axis_priority(b))
        })
    });
    ranked
}
