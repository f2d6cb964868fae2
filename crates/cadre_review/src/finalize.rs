#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cadre_contracts::audit::{
    AuditComponent, AuditEventInput, AuditEventType, AuditPayload, AuditSeverity, CorrelationId,
    PayloadKey, PayloadValue, TurnId,
};
use cadre_contracts::scoring::{
    InstrumentAssessmentId, InstrumentSpec, TraitScoreResult,
};
use cadre_contracts::{ContractViolation, MonotonicTimeNs};
use cadre_engines::trait_scorer::{ScoreRequest, ScoreResponse, TraitScorerRuntime};
use cadre_storage::review::{ReviewStore, StorageError};

pub mod reason_codes {
    use cadre_contracts::ReasonCodeId;

    // Finalization reason-code namespace.
    pub const FINALIZE_OK_SCORED: ReasonCodeId = ReasonCodeId(0x464E_0001);
}

/// Scoring wiring: load the accumulated responses for one instrument run,
/// score them, persist the result and freeze the assessment. The scorer
/// itself is pure; this runtime owns the side effects around it.
#[derive(Debug, Clone)]
pub struct AssessmentFinalizeRuntime {
    scorer: TraitScorerRuntime,
}

impl AssessmentFinalizeRuntime {
    pub fn new(scorer: TraitScorerRuntime) -> Self {
        Self { scorer }
    }

    pub fn finalize(
        &self,
        store: &mut ReviewStore,
        assessment_id: InstrumentAssessmentId,
        instrument: &InstrumentSpec,
        now: MonotonicTimeNs,
        correlation_id: CorrelationId,
        turn_id: TurnId,
    ) -> Result<TraitScoreResult, StorageError> {
        let record = store.instrument_assessment_row(assessment_id).ok_or(
            StorageError::ForeignKeyViolation {
                table: "instrument_assessments",
                key: assessment_id.0.to_string(),
            },
        )?;
        if record.instrument_id != instrument.instrument_id {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "instrument_spec.instrument_id",
                    reason: "must match the assessment's instrument",
                },
            ));
        }
        let subject_id = record.subject_id.clone();

        let responses = store.trait_response_rows(assessment_id).to_vec();
        let req = ScoreRequest::v1(instrument.clone(), responses)
            .map_err(StorageError::ContractViolation)?;
        let result = match self.scorer.run(&req) {
            ScoreResponse::Ok(ok) => ok.result,
            ScoreResponse::Refuse(_) => {
                return Err(StorageError::ContractViolation(
                    ContractViolation::InvalidValue {
                        field: "score_request.responses",
                        reason: "trait scorer refused the response set",
                    },
                ));
            }
        };

        store.complete_instrument_assessment(assessment_id, result.clone(), now)?;

        let mut entries = BTreeMap::new();
        entries.insert(
            PayloadKey::new("instrument_id").map_err(StorageError::ContractViolation)?,
            PayloadValue::new(instrument.instrument_id.as_str())
                .map_err(StorageError::ContractViolation)?,
        );
        if let Some(primary) = &result.primary {
            entries.insert(
                PayloadKey::new("primary_axis").map_err(StorageError::ContractViolation)?,
                PayloadValue::new(primary.as_str()).map_err(StorageError::ContractViolation)?,
            );
        }
        entries.insert(
            PayloadKey::new("skipped_responses").map_err(StorageError::ContractViolation)?,
            PayloadValue::new(result.skipped_responses.to_string())
                .map_err(StorageError::ContractViolation)?,
        );
        let input = AuditEventInput::v1(
            now,
            None,
            None,
            Some(subject_id),
            AuditComponent::TraitScorer,
            AuditEventType::ScoreFinalized,
            reason_codes::FINALIZE_OK_SCORED,
            AuditSeverity::Info,
            correlation_id,
            turn_id,
            AuditPayload::v1(entries).map_err(StorageError::ContractViolation)?,
            Some(format!("finalize_{}", assessment_id.0)),
        )
        .map_err(StorageError::ContractViolation)?;
        store.append_audit_row(input)?;

        Ok(result)
    }
}
