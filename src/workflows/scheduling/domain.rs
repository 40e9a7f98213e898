use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for interview proposals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub String);

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Back-office roles allowed to drive the scheduling workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Central credit unit analyst; reviews and decides interviews.
    Reviewer,
    /// Agency operator; creates demands and schedules appointments.
    Agency,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Reviewer => "reviewer",
            Role::Agency => "agency",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reviewer" | "cca" => Some(Role::Reviewer),
            "agency" => Some(Role::Agency),
            _ => None,
        }
    }
}

/// Acting identity, passed explicitly into every workflow entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    pub actor_id: Option<String>,
}

impl ActorContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_actor(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
        }
    }
}

/// Mutating workflow entry points guarded by the authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowAction {
    CreateProposal,
    ConfirmProposal,
    DecideProposal,
    ScheduleSignature,
    RunReminderSweep,
}

impl WorkflowAction {
    pub const fn label(self) -> &'static str {
        match self {
            WorkflowAction::CreateProposal => "create a proposal",
            WorkflowAction::ConfirmProposal => "confirm a proposal date",
            WorkflowAction::DecideProposal => "decide a proposal",
            WorkflowAction::ScheduleSignature => "schedule a signature",
            WorkflowAction::RunReminderSweep => "run the reminder sweep",
        }
    }

    /// Roles permitted to perform this action.
    pub const fn allows(self, role: Role) -> bool {
        match self {
            WorkflowAction::CreateProposal
            | WorkflowAction::ConfirmProposal
            | WorkflowAction::ScheduleSignature => {
                matches!(role, Role::Reviewer | Role::Agency)
            }
            WorkflowAction::DecideProposal | WorkflowAction::RunReminderSweep => {
                matches!(role, Role::Reviewer)
            }
        }
    }
}

/// Lifecycle of an interview proposal. Approved and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Confirmed,
    Approved,
    Rejected,
    /// Persisted, but the initial notification never reached the client.
    /// Non-terminal: confirmation is still allowed and the send can be retried.
    SendFailed,
}

impl ProposalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Confirmed => "confirmed",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::SendFailed => "send_failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ProposalStatus::Approved | ProposalStatus::Rejected)
    }
}

/// Where the interview takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentLocation {
    pub venue: String,
    pub city: String,
}

/// Interview-scheduling record: two candidate dates plus a shared time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentProposal {
    pub id: ProposalId,
    pub compliance_ref: String,
    pub client_name: String,
    pub client_phone: String,
    pub cpf: String,
    pub reviewer_id: String,
    pub slot_a: NaiveDate,
    pub slot_b: NaiveDate,
    pub window_start: String,
    pub window_end: String,
    pub location: AppointmentLocation,
    pub status: ProposalStatus,
    /// Populated only by a confirmation transition.
    pub confirmed_slot: Option<NaiveDate>,
    /// Set at most once, and only while the proposal is pending.
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// Provider id of the initial outbound message.
    pub message_id: Option<String>,
    pub observations: String,
    pub created_at: DateTime<Utc>,
}

impl AppointmentProposal {
    pub fn status_view(&self) -> ProposalView {
        ProposalView {
            id: self.id.clone(),
            compliance_ref: self.compliance_ref.clone(),
            client_name: self.client_name.clone(),
            status: self.status.label(),
            slot_a: self.slot_a,
            slot_b: self.slot_b,
            confirmed_slot: self.confirmed_slot,
            reminder_sent_at: self.reminder_sent_at,
            observations: self.observations.clone(),
        }
    }
}

/// Sanitized proposal representation for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalView {
    pub id: ProposalId,
    pub compliance_ref: String,
    pub client_name: String,
    pub status: &'static str,
    pub slot_a: NaiveDate,
    pub slot_b: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_slot: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub observations: String,
}

/// Lifecycle of a contract-signature appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    AwaitingSignature,
    Confirmed,
    Cancelled,
    Completed,
}

impl SignatureStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SignatureStatus::AwaitingSignature => "awaiting_signature",
            SignatureStatus::Confirmed => "confirmed",
            SignatureStatus::Cancelled => "cancelled",
            SignatureStatus::Completed => "completed",
        }
    }
}

/// Contract-signature appointment, only creatable once the linked compliance
/// record carries an approved interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureAppointment {
    pub id: String,
    pub compliance_ref: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: SignatureStatus,
}

/// Compliance record owned by the wider back office; this workflow only
/// flips its interview-approval fields through the cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub id: String,
    pub cpf: String,
    pub reviewer_id: String,
    pub interview_approved: bool,
    pub interview_ref: Option<ProposalId>,
    pub observations: String,
}

/// Strip everything but digits; CPFs arrive both punctuated and bare.
pub fn normalize_cpf(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
