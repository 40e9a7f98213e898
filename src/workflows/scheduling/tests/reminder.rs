use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::common::*;
use crate::config::SweepConfig;
use crate::workflows::notify::{InMemoryTemplateStore, TemplateStore};
use crate::workflows::scheduling::reminder::{ReminderSweeper, SweepSummary};
use crate::workflows::scheduling::repository::{MemoryStore, SchedulingStore};

fn build_sweeper<S>(store: Arc<S>) -> (ReminderSweeper<S>, Arc<MemoryGateway>)
where
    S: SchedulingStore + 'static,
{
    let gateway = Arc::new(MemoryGateway::default());
    let templates: Arc<dyn TemplateStore> = Arc::new(InMemoryTemplateStore::with_defaults());
    let config = SweepConfig {
        staleness_hours: 24,
        pace: Duration::from_millis(0),
    };
    let sweeper = ReminderSweeper::new(store, dispatcher(gateway.clone()), templates, config);
    (sweeper, gateway)
}

#[test]
fn sweep_reminds_stale_pending_proposals() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_proposal(stale_proposal("prop-stale-1", 48))
        .expect("seed");
    store
        .create_proposal(stale_proposal("prop-stale-2", 30))
        .expect("seed");
    let (sweeper, gateway) = build_sweeper(store.clone());

    let summary = sweeper.sweep(Utc::now()).expect("sweep succeeds");
    assert_eq!(
        summary,
        SweepSummary {
            scanned: 2,
            sent: 2,
            failed: 0,
        }
    );

    let sent = gateway.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.contains("still waiting"));

    for id in ["prop-stale-1", "prop-stale-2"] {
        let stored = store
            .get_proposal(&crate::workflows::scheduling::domain::ProposalId(
                id.to_string(),
            ))
            .expect("fetch succeeds")
            .expect("proposal present");
        assert!(stored.reminder_sent_at.is_some());
    }
}

#[test]
fn sweep_ignores_fresh_and_already_reminded_rows() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_proposal(stale_proposal("prop-fresh", 2))
        .expect("seed");
    let mut reminded = stale_proposal("prop-reminded", 48);
    reminded.reminder_sent_at = Some(Utc::now());
    store.create_proposal(reminded).expect("seed");
    let (sweeper, gateway) = build_sweeper(store);

    let summary = sweeper.sweep(Utc::now()).expect("sweep succeeds");
    assert_eq!(summary, SweepSummary::default());
    assert!(gateway.sent().is_empty());
}

#[test]
fn back_to_back_sweeps_send_at_most_one_reminder() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_proposal(stale_proposal("prop-stale-1", 48))
        .expect("seed");
    let (sweeper, gateway) = build_sweeper(store);

    let first = sweeper.sweep(Utc::now()).expect("first sweep succeeds");
    let second = sweeper.sweep(Utc::now()).expect("second sweep succeeds");

    assert_eq!(first.sent, 1);
    assert_eq!(second.scanned, 0);
    assert_eq!(second.sent, 0);
    assert_eq!(gateway.sent().len(), 1);
}

#[test]
fn a_lost_claim_means_no_send() {
    let store = Arc::new(ConflictingStore::new());
    store
        .inner()
        .create_proposal(stale_proposal("prop-stale-1", 48))
        .expect("seed");
    let (sweeper, gateway) = build_sweeper(store.clone());

    // Another sweep wins the claim between our listing and our write.
    store.conflict_on_next_update();
    let summary = sweeper.sweep(Utc::now()).expect("sweep succeeds");

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 0);
    assert!(gateway.sent().is_empty());
}

#[test]
fn sweep_continues_past_send_failures() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_proposal(stale_proposal("prop-stale-1", 48))
        .expect("seed");
    store
        .create_proposal(stale_proposal("prop-stale-2", 30))
        .expect("seed");
    let (sweeper, gateway) = build_sweeper(store);
    gateway.fail_whatsapp(true);

    let summary = sweeper.sweep(Utc::now()).expect("sweep finishes");
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 2);
}
