use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    normalize_cpf, AppointmentProposal, ComplianceRecord, ProposalId, ProposalStatus,
    SignatureAppointment,
};

/// Error enumeration for persistent-store failures. Fatal for the single
/// operation they occur in; batch jobs isolate them per row.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("interview approval missing for compliance record {0}")]
    InterviewNotApproved(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Partial proposal update applied under a compare-and-set guard.
#[derive(Debug, Clone, Default)]
pub struct ProposalPatch {
    pub status: Option<ProposalStatus>,
    pub confirmed_slot: Option<NaiveDate>,
    pub observations: Option<String>,
    pub message_id: Option<String>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// When set, the update additionally requires `reminder_sent_at` to still
    /// be null; this is how the sweep claims a row exactly once.
    pub expect_unreminded: bool,
}

/// Fields the approval cascade writes onto a compliance record.
#[derive(Debug, Clone)]
pub struct CompliancePatch {
    pub interview_approved: bool,
    pub interview_ref: ProposalId,
    pub observations: String,
}

/// Storage abstraction for the scheduling workflow.
///
/// `conditional_update_proposal` is the load-bearing method: both the
/// decision guard and the reminder claim rely on the expected-status check
/// happening at write time, not merely at read time.
pub trait SchedulingStore: Send + Sync {
    fn create_proposal(&self, proposal: AppointmentProposal) -> Result<(), StoreError>;
    fn get_proposal(&self, id: &ProposalId) -> Result<Option<AppointmentProposal>, StoreError>;
    /// Apply `patch` only if the row's current status equals `expected`
    /// (and, when requested, no reminder has been recorded). Returns whether
    /// the update committed; a missing row is an error, a failed guard is not.
    fn conditional_update_proposal(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        patch: ProposalPatch,
    ) -> Result<bool, StoreError>;
    /// Pending proposals created before `older_than` with no reminder yet.
    fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AppointmentProposal>, StoreError>;
    /// Compliance records matching the CPF in raw or digit-normalized form,
    /// scoped to one reviewer.
    fn find_compliance_by_cpf(
        &self,
        raw: &str,
        normalized: &str,
        reviewer_id: &str,
    ) -> Result<Vec<ComplianceRecord>, StoreError>;
    fn get_compliance(&self, id: &str) -> Result<Option<ComplianceRecord>, StoreError>;
    fn update_compliance(&self, id: &str, patch: CompliancePatch) -> Result<(), StoreError>;
    /// Rejects the insert when the linked compliance record's interview is
    /// not approved, independently of the workflow-level check.
    fn create_signature_appointment(
        &self,
        appointment: SignatureAppointment,
    ) -> Result<(), StoreError>;
}

/// In-memory store used by the default server wiring and the test suites.
/// All guards are evaluated under one lock per collection, which gives the
/// compare-and-set semantics the workflow requires.
#[derive(Default)]
pub struct MemoryStore {
    proposals: Mutex<HashMap<ProposalId, AppointmentProposal>>,
    compliance: Mutex<HashMap<String, ComplianceRecord>>,
    signatures: Mutex<HashMap<String, SignatureAppointment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a compliance record (test/demo wiring).
    pub fn insert_compliance(&self, record: ComplianceRecord) {
        self.compliance
            .lock()
            .expect("compliance lock")
            .insert(record.id.clone(), record);
    }

    pub fn signature_appointments(&self) -> Vec<SignatureAppointment> {
        self.signatures
            .lock()
            .expect("signatures lock")
            .values()
            .cloned()
            .collect()
    }
}

impl SchedulingStore for MemoryStore {
    fn create_proposal(&self, proposal: AppointmentProposal) -> Result<(), StoreError> {
        let mut proposals = self.proposals.lock().expect("proposals lock");
        if proposals.contains_key(&proposal.id) {
            return Err(StoreError::Conflict);
        }
        proposals.insert(proposal.id.clone(), proposal);
        Ok(())
    }

    fn get_proposal(&self, id: &ProposalId) -> Result<Option<AppointmentProposal>, StoreError> {
        let proposals = self.proposals.lock().expect("proposals lock");
        Ok(proposals.get(id).cloned())
    }

    fn conditional_update_proposal(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        patch: ProposalPatch,
    ) -> Result<bool, StoreError> {
        let mut proposals = self.proposals.lock().expect("proposals lock");
        let proposal = proposals.get_mut(id).ok_or(StoreError::NotFound)?;

        if proposal.status != expected {
            return Ok(false);
        }
        if patch.expect_unreminded && proposal.reminder_sent_at.is_some() {
            return Ok(false);
        }

        if let Some(status) = patch.status {
            proposal.status = status;
        }
        if let Some(slot) = patch.confirmed_slot {
            proposal.confirmed_slot = Some(slot);
        }
        if let Some(observations) = patch.observations {
            proposal.observations = observations;
        }
        if let Some(message_id) = patch.message_id {
            proposal.message_id = Some(message_id);
        }
        if let Some(reminded_at) = patch.reminder_sent_at {
            proposal.reminder_sent_at = Some(reminded_at);
        }

        Ok(true)
    }

    fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AppointmentProposal>, StoreError> {
        let proposals = self.proposals.lock().expect("proposals lock");
        let mut stale: Vec<AppointmentProposal> = proposals
            .values()
            .filter(|proposal| {
                proposal.status == ProposalStatus::Pending
                    && proposal.reminder_sent_at.is_none()
                    && proposal.created_at < older_than
            })
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(stale)
    }

    fn find_compliance_by_cpf(
        &self,
        raw: &str,
        normalized: &str,
        reviewer_id: &str,
    ) -> Result<Vec<ComplianceRecord>, StoreError> {
        let compliance = self.compliance.lock().expect("compliance lock");
        let mut matches: Vec<ComplianceRecord> = compliance
            .values()
            .filter(|record| {
                record.reviewer_id == reviewer_id
                    && (record.cpf == raw || normalize_cpf(&record.cpf) == normalized)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    fn get_compliance(&self, id: &str) -> Result<Option<ComplianceRecord>, StoreError> {
        let compliance = self.compliance.lock().expect("compliance lock");
        Ok(compliance.get(id).cloned())
    }

    fn update_compliance(&self, id: &str, patch: CompliancePatch) -> Result<(), StoreError> {
        let mut compliance = self.compliance.lock().expect("compliance lock");
        let record = compliance.get_mut(id).ok_or(StoreError::NotFound)?;
        record.interview_approved = patch.interview_approved;
        record.interview_ref = Some(patch.interview_ref);
        record.observations = patch.observations;
        Ok(())
    }

    fn create_signature_appointment(
        &self,
        appointment: SignatureAppointment,
    ) -> Result<(), StoreError> {
        let approved = {
            let compliance = self.compliance.lock().expect("compliance lock");
            compliance
                .get(&appointment.compliance_ref)
                .is_some_and(|record| record.interview_approved)
        };
        if !approved {
            return Err(StoreError::InterviewNotApproved(
                appointment.compliance_ref.clone(),
            ));
        }

        let mut signatures = self.signatures.lock().expect("signatures lock");
        if signatures.contains_key(&appointment.id) {
            return Err(StoreError::Conflict);
        }
        signatures.insert(appointment.id.clone(), appointment);
        Ok(())
    }
}
