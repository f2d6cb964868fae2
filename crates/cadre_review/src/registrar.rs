#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use cadre_contracts::audit::{
    AuditComponent, AuditEventInput, AuditEventType, AuditPayload, AuditSeverity, PayloadKey,
    PayloadValue,
};
use cadre_contracts::selection::{
    SelectionPolicy, SelectionRegisterRequest, SelectionRegisterResult,
};
use cadre_contracts::{ContractViolation, ReasonCodeId, Validate};
use cadre_storage::review::{
    selection_digest_hex, RegisterAttempt, ReviewStore, SelectionRejection, StorageError,
};

pub mod reason_codes {
    use cadre_contracts::ReasonCodeId;

    // Registrar reason-code namespace.
    pub const REGISTRAR_OK_SELECTION_ACCEPTED: ReasonCodeId = ReasonCodeId(0x5247_0001);

    pub const REGISTRAR_CYCLE_NOT_COLLECTING: ReasonCodeId = ReasonCodeId(0x5247_0010);
    pub const REGISTRAR_SELF_SELECTION: ReasonCodeId = ReasonCodeId(0x5247_0011);
    pub const REGISTRAR_PEER_NOT_ELIGIBLE: ReasonCodeId = ReasonCodeId(0x5247_0012);
    pub const REGISTRAR_PEER_AT_CAP: ReasonCodeId = ReasonCodeId(0x5247_0013);
    pub const REGISTRAR_QUOTA_EXHAUSTED: ReasonCodeId = ReasonCodeId(0x5247_0014);
    pub const REGISTRAR_DUPLICATE_SELECTION: ReasonCodeId = ReasonCodeId(0x5247_0015);
}

/// Write path of voluntary selection. One call = one registration attempt;
/// the store performs the atomic check-and-write, this runtime turns the
/// outcome into caller-facing data and an audit row. Rejections come back
/// with `success: false`, never as errors.
#[derive(Debug, Clone)]
pub struct SelectionRegistrarRuntime {
    policy: SelectionPolicy,
}

impl SelectionRegistrarRuntime {
    pub fn new(policy: SelectionPolicy) -> Result<Self, ContractViolation> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn register(
        &self,
        store: &mut ReviewStore,
        req: &SelectionRegisterRequest,
    ) -> Result<SelectionRegisterResult, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        let attempt = store.register_manual_selection(
            &self.policy,
            req.requested_at,
            &req.cycle_id,
            &req.evaluator_id,
            &req.peer_id,
        )?;

        let (result, event_type, severity, digest) = match &attempt {
            RegisterAttempt::Accepted(record) => (
                SelectionRegisterResult::accepted(
                    reason_codes::REGISTRAR_OK_SELECTION_ACCEPTED,
                    "peer selection registered",
                ),
                AuditEventType::SelectionAccepted,
                AuditSeverity::Info,
                Some(selection_digest_hex(record)),
            ),
            RegisterAttempt::Rejected(rejection) => {
                let (reason_code, message) = rejection_reason(*rejection);
                (
                    SelectionRegisterResult::rejected(reason_code, message),
                    AuditEventType::SelectionRejected,
                    AuditSeverity::Warn,
                    None,
                )
            }
        };

        let organization_id = store.cycle_row(&req.cycle_id).map(|c| c.organization_id.clone());
        let mut entries = BTreeMap::new();
        entries.insert(
            PayloadKey::new("peer_id").map_err(StorageError::ContractViolation)?,
            PayloadValue::new(req.peer_id.as_str()).map_err(StorageError::ContractViolation)?,
        );
        if let Some(digest) = digest {
            entries.insert(
                PayloadKey::new("selection_digest").map_err(StorageError::ContractViolation)?,
                PayloadValue::new(digest).map_err(StorageError::ContractViolation)?,
            );
        }
        let input = AuditEventInput::v1(
            req.requested_at,
            organization_id,
            Some(req.cycle_id.as_str().to_string()),
            Some(req.evaluator_id.clone()),
            AuditComponent::Registrar,
            event_type,
            result.reason_code,
            severity,
            req.correlation_id,
            req.turn_id,
            AuditPayload::v1(entries).map_err(StorageError::ContractViolation)?,
            Some(format!(
                "register_{}_{}_{}_{:08x}",
                req.cycle_id.as_str(),
                req.evaluator_id.as_str(),
                req.peer_id.as_str(),
                result.reason_code.0
            )),
        )
        .map_err(StorageError::ContractViolation)?;
        store.append_audit_row(input)?;

        Ok(result)
    }
}

fn rejection_reason(rejection: SelectionRejection) -> (ReasonCodeId, String) {
    match rejection {
        SelectionRejection::CycleNotCollecting { .. } => (
            reason_codes::REGISTRAR_CYCLE_NOT_COLLECTING,
            "cycle is not collecting selections".to_string(),
        ),
        SelectionRejection::SelfSelection => (
            reason_codes::REGISTRAR_SELF_SELECTION,
            "evaluators cannot select themselves".to_string(),
        ),
        SelectionRejection::PeerNotEligible => (
            reason_codes::REGISTRAR_PEER_NOT_ELIGIBLE,
            "peer is not eligible in this cycle".to_string(),
        ),
        SelectionRejection::PeerAtCap { times_chosen } => (
            reason_codes::REGISTRAR_PEER_AT_CAP,
            format!("peer already chosen {times_chosen} times, the cycle maximum"),
        ),
        SelectionRejection::QuotaExhausted { quota, .. } => (
            reason_codes::REGISTRAR_QUOTA_EXHAUSTED,
            format!("manual selection quota of {quota} already met"),
        ),
        SelectionRejection::DuplicateSelection => (
            reason_codes::REGISTRAR_DUPLICATE_SELECTION,
            "peer already selected by this evaluator".to_string(),
        ),
    }
}
