use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::workflows::notify::{
    render, Channel, DeliveryId, DispatchError, InMemoryTemplateStore, NotificationDispatcher,
    TemplateStore,
};

use super::auth::{AuthError, AuthorizationGate, IdentityDirectory};
use super::cascade::{ApprovalCascade, CascadeOutcome};
use super::domain::{
    ActorContext, AppointmentLocation, AppointmentProposal, ProposalId, ProposalStatus,
    SignatureAppointment, SignatureStatus, WorkflowAction,
};
use super::repository::{ProposalPatch, SchedulingStore, StoreError};
use super::validate::{
    CreateProposalRequest, ProposalValidator, ScheduleSignatureRequest, ValidationError,
};

/// Error raised by the scheduling workflow entry points.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("proposal {0} not found")]
    ProposalNotFound(ProposalId),
    #[error("compliance record {0} not found")]
    ComplianceNotFound(String),
    #[error("cannot {action} a proposal in status '{from}'")]
    InvalidStateTransition {
        from: &'static str,
        action: &'static str,
    },
    #[error("proposal {0} was updated concurrently; reload and retry")]
    VersionConflict(ProposalId),
    #[error("interview for compliance record {0} is not approved; signature scheduling is locked")]
    InterviewNotApproved(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Decision response: the state transition and the compliance fan-out are
/// two independent outcomes, so callers can observe partial cascade failure.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub transition_committed: bool,
    pub cascade: Vec<CascadeOutcome>,
}

static PROPOSAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SIGNATURE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_proposal_id() -> ProposalId {
    let id = PROPOSAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ProposalId(format!("prop-{id:06}"))
}

fn next_signature_id() -> String {
    let id = SIGNATURE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("sig-{id:06}")
}

/// Notification failures inside a workflow step. Never escalated: the caller
/// degrades the record or logs and continues.
#[derive(Debug, thiserror::Error)]
enum NotifyError {
    #[error("template '{0}' is not registered")]
    TemplateMissing(&'static str),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Service composing the authorization gate, validator, store, and
/// notification dispatcher into the interview scheduling workflow.
pub struct SchedulingService<S> {
    store: Arc<S>,
    gate: AuthorizationGate,
    validator: ProposalValidator,
    dispatcher: NotificationDispatcher,
    templates: Arc<dyn TemplateStore>,
    cascade: ApprovalCascade,
}

impl<S> SchedulingService<S>
where
    S: SchedulingStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<dyn IdentityDirectory>,
        templates: Arc<dyn TemplateStore>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            gate: AuthorizationGate::new(directory),
            validator: ProposalValidator,
            dispatcher,
            templates,
            cascade: ApprovalCascade,
        }
    }

    /// Create an interview proposal and send the initial client message.
    ///
    /// A delivery failure does not abort creation: the proposal is kept and
    /// moved to `send_failed`, a retriable non-terminal state.
    pub fn create(
        &self,
        actor: &ActorContext,
        request: CreateProposalRequest,
    ) -> Result<AppointmentProposal, SchedulingError> {
        self.gate.authorize(actor, WorkflowAction::CreateProposal)?;
        self.validator.validate_interview(&request)?;

        let id = next_proposal_id();
        let proposal = AppointmentProposal {
            id: id.clone(),
            compliance_ref: request.compliance_ref,
            client_name: request.client_name,
            client_phone: request.client_phone,
            cpf: request.cpf,
            reviewer_id: request.reviewer_id,
            slot_a: request.slot_a,
            slot_b: request.slot_b,
            window_start: request.window_start,
            window_end: request.window_end,
            location: AppointmentLocation {
                venue: request.venue,
                city: request.city,
            },
            status: ProposalStatus::Pending,
            confirmed_slot: None,
            reminder_sent_at: None,
            message_id: None,
            observations: request.observations.unwrap_or_default(),
            created_at: Utc::now(),
        };
        self.store.create_proposal(proposal.clone())?;
        info!(proposal = %id, client = %proposal.client_name, "interview proposal created");

        match self.dispatch_proposal_message(&proposal) {
            Ok(delivery) => {
                let patch = ProposalPatch {
                    message_id: Some(delivery.0),
                    ..Default::default()
                };
                self.store
                    .conditional_update_proposal(&id, ProposalStatus::Pending, patch)?;
            }
            Err(err) => {
                warn!(
                    proposal = %id,
                    error = %err,
                    "initial proposal message failed; marking proposal send_failed"
                );
                let patch = ProposalPatch {
                    status: Some(ProposalStatus::SendFailed),
                    ..Default::default()
                };
                self.store
                    .conditional_update_proposal(&id, ProposalStatus::Pending, patch)?;
            }
        }

        self.store
            .get_proposal(&id)?
            .ok_or(SchedulingError::ProposalNotFound(id))
    }

    /// Record the client's chosen date.
    ///
    /// Valid only from `pending` or `send_failed`. With `option` 1 or 2 the
    /// chosen date must equal the corresponding proposed slot; the
    /// free-choice path only requires a date no earlier than today.
    pub fn confirm_date(
        &self,
        actor: &ActorContext,
        id: &ProposalId,
        chosen: NaiveDate,
        option: Option<u8>,
    ) -> Result<AppointmentProposal, SchedulingError> {
        self.gate.authorize(actor, WorkflowAction::ConfirmProposal)?;

        let proposal = self
            .store
            .get_proposal(id)?
            .ok_or_else(|| SchedulingError::ProposalNotFound(id.clone()))?;

        match proposal.status {
            ProposalStatus::Pending | ProposalStatus::SendFailed => {}
            other => {
                return Err(SchedulingError::InvalidStateTransition {
                    from: other.label(),
                    action: "confirm",
                })
            }
        }

        match option {
            Some(1) => {
                if chosen != proposal.slot_a {
                    return Err(ValidationError::SlotMismatch { chosen, option: 1 }.into());
                }
            }
            Some(2) => {
                if chosen != proposal.slot_b {
                    return Err(ValidationError::SlotMismatch { chosen, option: 2 }.into());
                }
            }
            Some(other) => return Err(ValidationError::UnknownSlotOption(other).into()),
            None => {
                if chosen < Local::now().date_naive() {
                    return Err(ValidationError::PastDate(chosen).into());
                }
            }
        }

        let patch = ProposalPatch {
            status: Some(ProposalStatus::Confirmed),
            confirmed_slot: Some(chosen),
            ..Default::default()
        };
        let committed = self
            .store
            .conditional_update_proposal(id, proposal.status, patch)?;
        if !committed {
            return Err(SchedulingError::VersionConflict(id.clone()));
        }
        info!(proposal = %id, %chosen, "interview date confirmed");

        self.store
            .get_proposal(id)?
            .ok_or_else(|| SchedulingError::ProposalNotFound(id.clone()))
    }

    /// Approve or reject a confirmed proposal.
    ///
    /// Terminal by design: a second decision on the same proposal is a
    /// caller error, not a retry, and fails with `InvalidStateTransition`.
    /// The guard is re-checked at write time so a concurrent decision
    /// surfaces as `VersionConflict` instead of a silent overwrite.
    pub fn decide(
        &self,
        actor: &ActorContext,
        id: &ProposalId,
        approve: bool,
        note: &str,
    ) -> Result<DecisionOutcome, SchedulingError> {
        self.gate.authorize(actor, WorkflowAction::DecideProposal)?;

        let proposal = self
            .store
            .get_proposal(id)?
            .ok_or_else(|| SchedulingError::ProposalNotFound(id.clone()))?;
        if proposal.status != ProposalStatus::Confirmed {
            return Err(SchedulingError::InvalidStateTransition {
                from: proposal.status.label(),
                action: "decide",
            });
        }

        let next = if approve {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Rejected
        };
        let patch = ProposalPatch {
            status: Some(next),
            observations: Some(note.to_string()),
            ..Default::default()
        };
        let committed =
            self.store
                .conditional_update_proposal(id, ProposalStatus::Confirmed, patch)?;
        if !committed {
            return Err(SchedulingError::VersionConflict(id.clone()));
        }
        info!(proposal = %id, decision = next.label(), "interview decided");

        let decided = self
            .store
            .get_proposal(id)?
            .ok_or_else(|| SchedulingError::ProposalNotFound(id.clone()))?;

        let cascade = if approve {
            match self.cascade.apply(self.store.as_ref(), &decided) {
                Ok(outcomes) => outcomes,
                Err(err) => {
                    warn!(
                        proposal = %id,
                        error = %err,
                        "cascade lookup failed; approval stands with no targets updated"
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if let Err(err) = self.dispatch_decision_message(&decided, approve) {
            warn!(proposal = %id, error = %err, "decision notification failed; continuing");
        }

        Ok(DecisionOutcome {
            transition_committed: true,
            cascade,
        })
    }

    /// Schedule a contract signature for an approved compliance record.
    ///
    /// The `interview_approved` flag is the hard cross-entity gate; it is
    /// checked here and re-verified by the store on insert.
    pub fn schedule_signature(
        &self,
        actor: &ActorContext,
        request: ScheduleSignatureRequest,
    ) -> Result<SignatureAppointment, SchedulingError> {
        self.gate
            .authorize(actor, WorkflowAction::ScheduleSignature)?;
        let validated = self.validator.validate_signature(&request)?;

        let compliance = self
            .store
            .get_compliance(&request.compliance_ref)?
            .ok_or_else(|| SchedulingError::ComplianceNotFound(request.compliance_ref.clone()))?;
        if !compliance.interview_approved {
            return Err(SchedulingError::InterviewNotApproved(compliance.id));
        }

        let appointment = SignatureAppointment {
            id: next_signature_id(),
            compliance_ref: request.compliance_ref.clone(),
            scheduled_for: validated.scheduled_for,
            status: SignatureStatus::AwaitingSignature,
        };
        self.store
            .create_signature_appointment(appointment.clone())?;
        info!(
            appointment = %appointment.id,
            compliance = %appointment.compliance_ref,
            "signature appointment created"
        );

        if let Err(err) =
            self.dispatch_signature_message(&request, validated.scheduled_for)
        {
            warn!(
                appointment = %appointment.id,
                error = %err,
                "signature notification failed; continuing"
            );
        }

        Ok(appointment)
    }

    /// Gate check for sweep triggers arriving over HTTP; timer-driven runs
    /// bypass this and call the sweeper directly.
    pub fn authorize_sweep(&self, actor: &ActorContext) -> Result<(), SchedulingError> {
        self.gate.authorize(actor, WorkflowAction::RunReminderSweep)?;
        Ok(())
    }

    /// Fetch a proposal for API responses.
    pub fn get(&self, id: &ProposalId) -> Result<AppointmentProposal, SchedulingError> {
        self.store
            .get_proposal(id)?
            .ok_or_else(|| SchedulingError::ProposalNotFound(id.clone()))
    }

    fn dispatch_proposal_message(
        &self,
        proposal: &AppointmentProposal,
    ) -> Result<DeliveryId, NotifyError> {
        let key = InMemoryTemplateStore::INTERVIEW_PROPOSAL;
        let template = self
            .templates
            .get(key)
            .ok_or(NotifyError::TemplateMissing(key))?;
        let text = render(&template.body, &proposal_vars(proposal));
        Ok(self.dispatcher.send(
            Channel::WhatsApp,
            &proposal.client_phone,
            template.subject.as_deref(),
            &text,
        )?)
    }

    fn dispatch_decision_message(
        &self,
        proposal: &AppointmentProposal,
        approve: bool,
    ) -> Result<DeliveryId, NotifyError> {
        let key = InMemoryTemplateStore::INTERVIEW_DECISION;
        let template = self
            .templates
            .get(key)
            .ok_or(NotifyError::TemplateMissing(key))?;

        let mut vars = proposal_vars(proposal);
        vars.insert(
            "decision".to_string(),
            if approve { "approved" } else { "rejected" }.to_string(),
        );
        vars.insert("note".to_string(), proposal.observations.clone());

        let text = render(&template.body, &vars);
        Ok(self.dispatcher.send(
            Channel::WhatsApp,
            &proposal.client_phone,
            template.subject.as_deref(),
            &text,
        )?)
    }

    fn dispatch_signature_message(
        &self,
        request: &ScheduleSignatureRequest,
        scheduled_for: DateTime<Utc>,
    ) -> Result<DeliveryId, NotifyError> {
        let key = InMemoryTemplateStore::SIGNATURE_SCHEDULED;
        let template = self
            .templates
            .get(key)
            .ok_or(NotifyError::TemplateMissing(key))?;

        let mut vars = BTreeMap::new();
        vars.insert("client_name".to_string(), request.client_name.clone());
        vars.insert(
            "scheduled_for".to_string(),
            scheduled_for.format("%d/%m/%Y %H:%M").to_string(),
        );

        let text = render(&template.body, &vars);
        Ok(self.dispatcher.send(
            Channel::WhatsApp,
            &request.client_phone,
            template.subject.as_deref(),
            &text,
        )?)
    }
}

/// Template variables shared by the proposal and reminder messages.
pub(crate) fn proposal_vars(proposal: &AppointmentProposal) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("client_name".to_string(), proposal.client_name.clone());
    vars.insert(
        "slot_a".to_string(),
        proposal.slot_a.format("%d/%m/%Y").to_string(),
    );
    vars.insert(
        "slot_b".to_string(),
        proposal.slot_b.format("%d/%m/%Y").to_string(),
    );
    vars.insert("window_start".to_string(), proposal.window_start.clone());
    vars.insert("window_end".to_string(), proposal.window_end.clone());
    vars.insert("venue".to_string(), proposal.location.venue.clone());
    vars.insert("city".to_string(), proposal.location.city.clone());
    vars
}
