//! Integration scenarios for the reminder sweep: staleness selection,
//! at-most-once delivery through the conditional claim, and isolation of
//! per-row failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

use credops::config::{MessagingConfig, SweepConfig};
use credops::workflows::notify::{
    DeliveryId, GatewayError, InMemoryTemplateStore, MessagingGateway, NotificationDispatcher,
    TemplateStore,
};
use credops::workflows::scheduling::{
    AppointmentLocation, AppointmentProposal, MemoryStore, ProposalId, ProposalStatus,
    ReminderSweeper, SchedulingStore,
};

#[derive(Default)]
struct CountingGateway {
    sent: Mutex<Vec<String>>,
    fail_whatsapp: AtomicBool,
}

impl CountingGateway {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("lock").clone()
    }
}

impl MessagingGateway for CountingGateway {
    fn send_whatsapp(&self, address: &str, _: &str) -> Result<DeliveryId, GatewayError> {
        if self.fail_whatsapp.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }
        let mut sent = self.sent.lock().expect("lock");
        sent.push(address.to_string());
        Ok(DeliveryId(format!("wa-{:03}", sent.len())))
    }

    fn send_email(&self, _: &str, _: &str, _: &str) -> Result<DeliveryId, GatewayError> {
        Ok(DeliveryId("mail-000".to_string()))
    }
}

fn pending_proposal(id: &str, hours_old: i64) -> AppointmentProposal {
    AppointmentProposal {
        id: ProposalId(id.to_string()),
        compliance_ref: "compliance-01".to_string(),
        client_name: "Ana Souza".to_string(),
        client_phone: "(44) 9 9821-3344".to_string(),
        cpf: "529.982.247-25".to_string(),
        reviewer_id: "ana".to_string(),
        slot_a: NaiveDate::from_ymd_opt(2030, 9, 14).expect("valid date"),
        slot_b: NaiveDate::from_ymd_opt(2030, 9, 16).expect("valid date"),
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
        created_at: Utc::now() - ChronoDuration::hours(hours_old),
    }
}

fn build_sweeper(
    store: Arc<MemoryStore>,
) -> (ReminderSweeper<MemoryStore>, Arc<CountingGateway>) {
    let gateway = Arc::new(CountingGateway::default());
    let templates: Arc<dyn TemplateStore> = Arc::new(InMemoryTemplateStore::with_defaults());
    let sweeper = ReminderSweeper::new(
        store,
        NotificationDispatcher::new(gateway.clone(), MessagingConfig::default()),
        templates,
        SweepConfig {
            staleness_hours: 24,
            pace: Duration::from_millis(0),
        },
    );
    (sweeper, gateway)
}

#[test]
fn sweep_selects_only_stale_unreminded_pending_rows() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_proposal(pending_proposal("prop-old", 36))
        .expect("seed");
    store
        .create_proposal(pending_proposal("prop-new", 1))
        .expect("seed");
    let mut confirmed = pending_proposal("prop-confirmed", 36);
    confirmed.status = ProposalStatus::Confirmed;
    store.create_proposal(confirmed).expect("seed");

    let (sweeper, gateway) = build_sweeper(store.clone());
    let summary = sweeper.sweep(Utc::now()).expect("sweep succeeds");

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(gateway.sent(), vec!["5544998213344@c.us".to_string()]);

    let reminded = store
        .get_proposal(&ProposalId("prop-old".to_string()))
        .expect("fetch succeeds")
        .expect("proposal present");
    assert!(reminded.reminder_sent_at.is_some());
    assert_eq!(reminded.status, ProposalStatus::Pending);
}

#[test]
fn repeated_sweeps_never_send_a_second_reminder() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_proposal(pending_proposal("prop-old", 36))
        .expect("seed");
    let (sweeper, gateway) = build_sweeper(store);

    let first = sweeper.sweep(Utc::now()).expect("first sweep");
    let second = sweeper.sweep(Utc::now()).expect("second sweep");
    let third = sweeper.sweep(Utc::now()).expect("third sweep");

    assert_eq!(first.sent, 1);
    assert_eq!(second.sent + third.sent, 0);
    assert_eq!(gateway.sent().len(), 1);
}

#[test]
fn overlapping_sweeps_against_a_shared_store_send_once() {
    // Two sweepers over the same store model a timer firing while the
    // previous run is still draining; the conditional claim decides the race.
    let store = Arc::new(MemoryStore::new());
    store
        .create_proposal(pending_proposal("prop-old", 36))
        .expect("seed");

    let (first_sweeper, first_gateway) = build_sweeper(store.clone());
    let (second_sweeper, second_gateway) = build_sweeper(store);

    let first = first_sweeper.sweep(Utc::now()).expect("first sweep");
    let second = second_sweeper.sweep(Utc::now()).expect("second sweep");

    assert_eq!(first.sent + second.sent, 1);
    assert_eq!(first_gateway.sent().len() + second_gateway.sent().len(), 1);
}

#[test]
fn a_failing_row_does_not_abort_the_rest_of_the_sweep() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_proposal(pending_proposal("prop-1", 36))
        .expect("seed");
    store
        .create_proposal(pending_proposal("prop-2", 30))
        .expect("seed");
    let (sweeper, gateway) = build_sweeper(store);

    // Provider times out for the whole run; every row is tallied, none aborts.
    gateway.fail_whatsapp.store(true, Ordering::SeqCst);
    let summary = sweeper.sweep(Utc::now()).expect("sweep finishes");

    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 2);
}
