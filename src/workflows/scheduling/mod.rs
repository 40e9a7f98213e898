//! Interview scheduling and approval workflow.
//!
//! A scheduling request flows through the authorization gate and the
//! validator into the proposal state machine (pending → confirmed →
//! approved/rejected, with `send_failed` as a retriable detour). An approval
//! fans out to the matching compliance records and unlocks signature
//! scheduling; a periodic sweep nudges clients who never confirmed a date.

pub mod auth;
pub mod cascade;
pub mod domain;
pub mod reminder;
pub mod repository;
pub mod router;
pub mod service;
pub mod validate;

#[cfg(test)]
mod tests;

pub use auth::{AuthError, AuthorizationGate, IdentityDirectory, StaticDirectory};
pub use cascade::{ApprovalCascade, CascadeOutcome};
pub use domain::{
    ActorContext, AppointmentLocation, AppointmentProposal, ComplianceRecord, ProposalId,
    ProposalStatus, ProposalView, Role, SignatureAppointment, SignatureStatus, WorkflowAction,
};
pub use reminder::{ReminderSweeper, SweepSummary};
pub use repository::{
    CompliancePatch, MemoryStore, ProposalPatch, SchedulingStore, StoreError,
};
pub use router::{scheduling_router, ConfirmDateRequest, DecisionRequest};
pub use service::{DecisionOutcome, SchedulingError, SchedulingService};
pub use validate::{
    ContractType, CreateProposalRequest, FinancingModality, ProposalValidator,
    ScheduleSignatureRequest, ValidationError,
};
