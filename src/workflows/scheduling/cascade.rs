use serde::Serialize;
use tracing::warn;

use super::domain::{normalize_cpf, AppointmentProposal};
use super::repository::{CompliancePatch, SchedulingStore, StoreError};

/// Result of one compliance-record update within the approval fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeOutcome {
    pub compliance_id: String,
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fan-out update applied to compliance records when an interview is
/// approved. Best-effort by design: each target is updated independently and
/// a failure never rolls back the proposal's own approved status.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalCascade;

impl ApprovalCascade {
    /// Flip `interview_approved` on every compliance record matching the
    /// proposal's CPF (raw or digit-normalized) under the same reviewer.
    pub fn apply<S: SchedulingStore + ?Sized>(
        &self,
        store: &S,
        proposal: &AppointmentProposal,
    ) -> Result<Vec<CascadeOutcome>, StoreError> {
        let normalized = normalize_cpf(&proposal.cpf);
        let targets =
            store.find_compliance_by_cpf(&proposal.cpf, &normalized, &proposal.reviewer_id)?;

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let patch = CompliancePatch {
                interview_approved: true,
                interview_ref: proposal.id.clone(),
                observations: proposal.observations.clone(),
            };
            match store.update_compliance(&target.id, patch) {
                Ok(()) => outcomes.push(CascadeOutcome {
                    compliance_id: target.id,
                    committed: true,
                    error: None,
                }),
                Err(err) => {
                    warn!(
                        proposal = %proposal.id,
                        compliance = %target.id,
                        error = %err,
                        "approval cascade target failed; continuing with remaining targets"
                    );
                    outcomes.push(CascadeOutcome {
                        compliance_id: target.id,
                        committed: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(outcomes)
    }
}
