use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::MessagingConfig;
use crate::workflows::notify::{
    DeliveryId, GatewayError, InMemoryTemplateStore, MessagingGateway, NotificationDispatcher,
    TemplateStore,
};
use crate::workflows::scheduling::domain::{
    ActorContext, AppointmentLocation, AppointmentProposal, ComplianceRecord, ProposalId,
    ProposalStatus, Role, SignatureAppointment,
};
use crate::workflows::scheduling::repository::{
    CompliancePatch, MemoryStore, ProposalPatch, SchedulingStore, StoreError,
};
use crate::workflows::scheduling::service::SchedulingService;
use crate::workflows::scheduling::validate::{CreateProposalRequest, ScheduleSignatureRequest};
use crate::workflows::scheduling::StaticDirectory;

pub(super) const REVIEWER: &str = "ana";
pub(super) const AGENCY: &str = "agency-014";
pub(super) const RAW_CPF: &str = "529.982.247-25";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SentMessage {
    pub channel: &'static str,
    pub address: String,
    pub text: String,
}

/// Gateway fake recording every send; failures are injectable per channel.
#[derive(Default)]
pub(super) struct MemoryGateway {
    sent: Mutex<Vec<SentMessage>>,
    fail_whatsapp: AtomicBool,
}

impl MemoryGateway {
    pub(super) fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().expect("lock").clone()
    }

    pub(super) fn fail_whatsapp(&self, fail: bool) {
        self.fail_whatsapp.store(fail, Ordering::SeqCst);
    }
}

impl MessagingGateway for MemoryGateway {
    fn send_whatsapp(&self, address: &str, text: &str) -> Result<DeliveryId, GatewayError> {
        if self.fail_whatsapp.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("injected failure".to_string()));
        }
        let mut sent = self.sent.lock().expect("lock");
        sent.push(SentMessage {
            channel: "whatsapp",
            address: address.to_string(),
            text: text.to_string(),
        });
        Ok(DeliveryId(format!("wa-{:03}", sent.len())))
    }

    fn send_email(&self, to: &str, _: &str, html: &str) -> Result<DeliveryId, GatewayError> {
        let mut sent = self.sent.lock().expect("lock");
        sent.push(SentMessage {
            channel: "email",
            address: to.to_string(),
            text: html.to_string(),
        });
        Ok(DeliveryId(format!("mail-{:03}", sent.len())))
    }
}

pub(super) fn reviewer() -> ActorContext {
    ActorContext::for_actor(REVIEWER)
}

pub(super) fn agency() -> ActorContext {
    ActorContext::for_actor(AGENCY)
}

pub(super) fn slot_a() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 9, 14).expect("valid date")
}

pub(super) fn slot_b() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 9, 16).expect("valid date")
}

pub(super) fn proposal_request() -> CreateProposalRequest {
    CreateProposalRequest {
        client_name: "Ana Souza".to_string(),
        client_phone: "(44) 9 9821-3344".to_string(),
        cpf: RAW_CPF.to_string(),
        contract_type: "individual".to_string(),
        financing_modality: "program-a".to_string(),
        proposal_type: "interview".to_string(),
        reviewer_id: REVIEWER.to_string(),
        compliance_ref: "compliance-01".to_string(),
        slot_a: slot_a(),
        slot_b: slot_b(),
        window_start: "09:00".to_string(),
        window_end: "11:30".to_string(),
        venue: "Agency branch 014".to_string(),
        city: "Maringá".to_string(),
        observations: None,
    }
}

pub(super) fn signature_request(compliance_ref: &str) -> ScheduleSignatureRequest {
    ScheduleSignatureRequest {
        client_name: "Ana Souza".to_string(),
        client_phone: "(44) 9 9821-3344".to_string(),
        cpf: RAW_CPF.to_string(),
        contract_type: "individual".to_string(),
        financing_modality: "program-a".to_string(),
        proposal_type: "signature".to_string(),
        reviewer_id: REVIEWER.to_string(),
        compliance_ref: compliance_ref.to_string(),
        scheduled_for: "2030-10-01T14:00:00Z".to_string(),
    }
}

pub(super) fn compliance_record(id: &str, cpf: &str) -> ComplianceRecord {
    ComplianceRecord {
        id: id.to_string(),
        cpf: cpf.to_string(),
        reviewer_id: REVIEWER.to_string(),
        interview_approved: false,
        interview_ref: None,
        observations: String::new(),
    }
}

pub(super) fn directory() -> StaticDirectory {
    let mut directory = StaticDirectory::new();
    directory.assign(REVIEWER, Role::Reviewer);
    directory.assign(AGENCY, Role::Agency);
    directory
}

pub(super) fn dispatcher(gateway: Arc<dyn MessagingGateway>) -> NotificationDispatcher {
    NotificationDispatcher::new(gateway, MessagingConfig::default())
}

pub(super) fn build_service<S>(
    store: Arc<S>,
) -> (Arc<SchedulingService<S>>, Arc<MemoryGateway>)
where
    S: SchedulingStore + 'static,
{
    let gateway = Arc::new(MemoryGateway::default());
    let templates: Arc<dyn TemplateStore> = Arc::new(InMemoryTemplateStore::with_defaults());
    let service = Arc::new(SchedulingService::new(
        store,
        Arc::new(directory()),
        templates,
        dispatcher(gateway.clone()),
    ));
    (service, gateway)
}

pub(super) fn stale_proposal(id: &str, hours_old: i64) -> AppointmentProposal {
    AppointmentProposal {
        id: ProposalId(id.to_string()),
        compliance_ref: "compliance-01".to_string(),
        client_name: "Ana Souza".to_string(),
        client_phone: "(44) 9 9821-3344".to_string(),
        cpf: RAW_CPF.to_string(),
        reviewer_id: REVIEWER.to_string(),
        slot_a: slot_a(),
        slot_b: slot_b(),
        window_start: "09:00".to_string(),
        window_end: "11:30".to_string(),
        location: AppointmentLocation {
            venue: "Agency branch 014".to_string(),
            city: "Maringá".to_string(),
        },
        status: ProposalStatus::Pending,
        confirmed_slot: None,
        reminder_sent_at: None,
        message_id: None,
        observations: String::new(),
        created_at: Utc::now() - Duration::hours(hours_old),
    }
}

/// Store wrapper whose compliance updates fail for selected ids, so cascade
/// partial failure can be observed.
pub(super) struct FlakyComplianceStore {
    inner: MemoryStore,
    failing: HashSet<String>,
}

impl FlakyComplianceStore {
    pub(super) fn failing_for(ids: &[&str]) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub(super) fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl SchedulingStore for FlakyComplianceStore {
    fn create_proposal(&self, proposal: AppointmentProposal) -> Result<(), StoreError> {
        self.inner.create_proposal(proposal)
    }

    fn get_proposal(&self, id: &ProposalId) -> Result<Option<AppointmentProposal>, StoreError> {
        self.inner.get_proposal(id)
    }

    fn conditional_update_proposal(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        patch: ProposalPatch,
    ) -> Result<bool, StoreError> {
        self.inner.conditional_update_proposal(id, expected, patch)
    }

    fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AppointmentProposal>, StoreError> {
        self.inner.list_stale_pending(older_than)
    }

    fn find_compliance_by_cpf(
        &self,
        raw: &str,
        normalized: &str,
        reviewer_id: &str,
    ) -> Result<Vec<ComplianceRecord>, StoreError> {
        self.inner.find_compliance_by_cpf(raw, normalized, reviewer_id)
    }

    fn get_compliance(&self, id: &str) -> Result<Option<ComplianceRecord>, StoreError> {
        self.inner.get_compliance(id)
    }

    fn update_compliance(&self, id: &str, patch: CompliancePatch) -> Result<(), StoreError> {
        if self.failing.contains(id) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.update_compliance(id, patch)
    }

    fn create_signature_appointment(
        &self,
        appointment: SignatureAppointment,
    ) -> Result<(), StoreError> {
        self.inner.create_signature_appointment(appointment)
    }
}

/// Store wrapper that refuses the next conditional update, simulating a
/// concurrent writer landing between read and write.
pub(super) struct ConflictingStore {
    inner: MemoryStore,
    conflict_next: AtomicBool,
}

impl ConflictingStore {
    pub(super) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            conflict_next: AtomicBool::new(false),
        }
    }

    pub(super) fn conflict_on_next_update(&self) {
        self.conflict_next.store(true, Ordering::SeqCst);
    }

    pub(super) fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl SchedulingStore for ConflictingStore {
    fn create_proposal(&self, proposal: AppointmentProposal) -> Result<(), StoreError> {
        self.inner.create_proposal(proposal)
    }

    fn get_proposal(&self, id: &ProposalId) -> Result<Option<AppointmentProposal>, StoreError> {
        self.inner.get_proposal(id)
    }

    fn conditional_update_proposal(
        &self,
        id: &ProposalId,
        expected: ProposalStatus,
        patch: ProposalPatch,
    ) -> Result<bool, StoreError> {
        if self.conflict_next.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.conditional_update_proposal(id, expected, patch)
    }

    fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<AppointmentProposal>, StoreError> {
        self.inner.list_stale_pending(older_than)
    }

    fn find_compliance_by_cpf(
        &self,
        raw: &str,
        normalized: &str,
        reviewer_id: &str,
    ) -> Result<Vec<ComplianceRecord>, StoreError> {
        self.inner.find_compliance_by_cpf(raw, normalized, reviewer_id)
    }

    fn get_compliance(&self, id: &str) -> Result<Option<ComplianceRecord>, StoreError> {
        self.inner.get_compliance(id)
    }

    fn update_compliance(&self, id: &str, patch: CompliancePatch) -> Result<(), StoreError> {
        self.inner.update_compliance(id, patch)
    }

    fn create_signature_appointment(
        &self,
        appointment: SignatureAppointment,
    ) -> Result<(), StoreError> {
        self.inner.create_signature_appointment(appointment)
    }
}
