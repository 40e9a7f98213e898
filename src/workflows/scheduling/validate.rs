use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Inbound request to schedule a client interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProposalRequest {
    pub client_name: String,
    pub client_phone: String,
    pub cpf: String,
    pub contract_type: String,
    pub financing_modality: String,
    pub proposal_type: String,
    pub reviewer_id: String,
    pub compliance_ref: String,
    pub slot_a: NaiveDate,
    pub slot_b: NaiveDate,
    pub window_start: String,
    pub window_end: String,
    pub venue: String,
    pub city: String,
    #[serde(default)]
    pub observations: Option<String>,
}

/// Inbound request to schedule a contract signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSignatureRequest {
    pub client_name: String,
    pub client_phone: String,
    pub cpf: String,
    pub contract_type: String,
    pub financing_modality: String,
    pub proposal_type: String,
    pub reviewer_id: String,
    pub compliance_ref: String,
    /// RFC 3339 date-time of the signature appointment.
    pub scheduled_for: String,
}

pub const MIN_CPF_LEN: usize = 11;

/// First-violation validation errors, one per declared constraint.
///
/// Checks run in the order the form is filled, so a payload with several bad
/// fields reports only the topmost one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("cpf must have at least 11 characters, got {0}")]
    CpfTooShort(usize),
    #[error("unknown contract type '{0}'; expected individual or development-project")]
    UnknownContractType(String),
    #[error("unknown financing modality '{0}'; expected program-a or program-b")]
    UnknownFinancingModality(String),
    #[error("scheduling date-time must not be empty")]
    EmptySchedule,
    #[error("could not parse '{0}' as an RFC 3339 date-time")]
    UnparseableDateTime(String),
    #[error("unknown proposal type '{0}'; expected interview or signature")]
    UnknownProposalType(String),
    #[error("expected a {expected} request, got '{found}'")]
    ProposalTypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("reviewer identifier must not be empty")]
    MissingReviewer,
    #[error("slot option must be 1 or 2, got {0}")]
    UnknownSlotOption(u8),
    #[error("chosen date {chosen} does not match proposed slot {option}")]
    SlotMismatch { chosen: NaiveDate, option: u8 },
    #[error("chosen date {0} is earlier than today")]
    PastDate(NaiveDate),
}

impl ValidationError {
    /// Name of the offending request field, for actionable API errors.
    pub const fn field(&self) -> &'static str {
        match self {
            ValidationError::CpfTooShort(_) => "cpf",
            ValidationError::UnknownContractType(_) => "contract_type",
            ValidationError::UnknownFinancingModality(_) => "financing_modality",
            ValidationError::EmptySchedule | ValidationError::UnparseableDateTime(_) => {
                "scheduled_for"
            }
            ValidationError::UnknownProposalType(_)
            | ValidationError::ProposalTypeMismatch { .. } => "proposal_type",
            ValidationError::MissingReviewer => "reviewer_id",
            ValidationError::UnknownSlotOption(_) => "option",
            ValidationError::SlotMismatch { .. } | ValidationError::PastDate(_) => "chosen_date",
        }
    }
}

/// Contract kinds financed through the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractType {
    Individual,
    DevelopmentProject,
}

impl ContractType {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "individual" => Some(Self::Individual),
            "development-project" => Some(Self::DevelopmentProject),
            _ => None,
        }
    }
}

/// Financing lines an appointment can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinancingModality {
    ProgramA,
    ProgramB,
}

impl FinancingModality {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "program-a" => Some(Self::ProgramA),
            "program-b" => Some(Self::ProgramB),
            _ => None,
        }
    }
}

/// What is being scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalKind {
    Interview,
    Signature,
}

impl ProposalKind {
    const fn label(self) -> &'static str {
        match self {
            ProposalKind::Interview => "interview",
            ProposalKind::Signature => "signature",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "interview" => Some(Self::Interview),
            "signature" => Some(Self::Signature),
            _ => None,
        }
    }
}

/// Typed output of a successful interview-request validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedInterview {
    pub contract_type: ContractType,
    pub financing_modality: FinancingModality,
}

/// Typed output of a successful signature-request validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedSignature {
    pub contract_type: ContractType,
    pub financing_modality: FinancingModality,
    pub scheduled_for: DateTime<Utc>,
}

/// Schema/constraint validation for inbound scheduling requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalValidator;

impl ProposalValidator {
    pub fn validate_interview(
        &self,
        request: &CreateProposalRequest,
    ) -> Result<ValidatedInterview, ValidationError> {
        let (contract_type, financing_modality) = self.common_checks(
            &request.cpf,
            &request.contract_type,
            &request.financing_modality,
            !request.window_start.trim().is_empty() && !request.window_end.trim().is_empty(),
            &request.proposal_type,
            ProposalKind::Interview,
            &request.reviewer_id,
        )?;

        Ok(ValidatedInterview {
            contract_type,
            financing_modality,
        })
    }

    pub fn validate_signature(
        &self,
        request: &ScheduleSignatureRequest,
    ) -> Result<ValidatedSignature, ValidationError> {
        let (contract_type, financing_modality) = self.common_checks(
            &request.cpf,
            &request.contract_type,
            &request.financing_modality,
            !request.scheduled_for.trim().is_empty(),
            &request.proposal_type,
            ProposalKind::Signature,
            &request.reviewer_id,
        )?;

        let scheduled_for = DateTime::parse_from_rfc3339(request.scheduled_for.trim())
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|_| ValidationError::UnparseableDateTime(request.scheduled_for.clone()))?;

        Ok(ValidatedSignature {
            contract_type,
            financing_modality,
            scheduled_for,
        })
    }

    /// The shared, ordered constraint list. The first violation wins.
    #[allow(clippy::too_many_arguments)]
    fn common_checks(
        &self,
        cpf: &str,
        contract_type: &str,
        financing_modality: &str,
        schedule_present: bool,
        proposal_type: &str,
        expected_kind: ProposalKind,
        reviewer_id: &str,
    ) -> Result<(ContractType, FinancingModality), ValidationError> {
        if cpf.trim().chars().count() < MIN_CPF_LEN {
            return Err(ValidationError::CpfTooShort(cpf.trim().chars().count()));
        }

        let contract_type = ContractType::parse(contract_type)
            .ok_or_else(|| ValidationError::UnknownContractType(contract_type.to_string()))?;

        let financing_modality = FinancingModality::parse(financing_modality).ok_or_else(|| {
            ValidationError::UnknownFinancingModality(financing_modality.to_string())
        })?;

        if !schedule_present {
            return Err(ValidationError::EmptySchedule);
        }

        let kind = ProposalKind::parse(proposal_type)
            .ok_or_else(|| ValidationError::UnknownProposalType(proposal_type.to_string()))?;
        if kind != expected_kind {
            return Err(ValidationError::ProposalTypeMismatch {
                expected: expected_kind.label(),
                found: proposal_type.to_string(),
            });
        }

        if reviewer_id.trim().is_empty() {
            return Err(ValidationError::MissingReviewer);
        }

        Ok((contract_type, financing_modality))
    }
}
