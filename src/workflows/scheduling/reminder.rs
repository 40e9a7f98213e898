use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SweepConfig;
use crate::workflows::notify::{
    render, Channel, InMemoryTemplateStore, NotificationDispatcher, TemplateStore,
};

use super::domain::ProposalStatus;
use super::repository::{ProposalPatch, SchedulingStore, StoreError};
use super::service::proposal_vars;

/// Tallies for one reminder sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Stale pending proposals selected for this run.
    pub scanned: usize,
    /// Reminders delivered (and recorded) by this run.
    pub sent: usize,
    /// Rows whose send or store write failed; the sweep continued past them.
    pub failed: usize,
}

/// Idempotent batch job nudging clients who have not confirmed a proposed
/// date. Safe to trigger from a timer while request-driven operations run.
pub struct ReminderSweeper<S> {
    store: Arc<S>,
    dispatcher: NotificationDispatcher,
    templates: Arc<dyn TemplateStore>,
    config: SweepConfig,
}

impl<S> ReminderSweeper<S>
where
    S: SchedulingStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        dispatcher: NotificationDispatcher,
        templates: Arc<dyn TemplateStore>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            templates,
            config,
        }
    }

    /// Scan stale pending proposals and send at most one reminder each.
    ///
    /// Each row is claimed through a conditional update before anything is
    /// sent; a claim that does not commit means another sweep owns the row,
    /// so it is skipped. Per-row failures are tallied and never abort the
    /// sweep; only the initial listing is fatal.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepSummary, StoreError> {
        let threshold = now - Duration::hours(self.config.staleness_hours);
        let stale = self.store.list_stale_pending(threshold)?;

        let mut summary = SweepSummary {
            scanned: stale.len(),
            ..Default::default()
        };

        let template = self.templates.get(InMemoryTemplateStore::INTERVIEW_REMINDER);
        let Some(template) = template else {
            warn!("reminder template missing; sweep sends nothing");
            summary.failed = stale.len();
            return Ok(summary);
        };

        let last = stale.len().saturating_sub(1);
        for (index, proposal) in stale.into_iter().enumerate() {
            let claim = ProposalPatch {
                reminder_sent_at: Some(now),
                expect_unreminded: true,
                ..Default::default()
            };
            match self.store.conditional_update_proposal(
                &proposal.id,
                ProposalStatus::Pending,
                claim,
            ) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(proposal = %proposal.id, "reminder already claimed; skipping");
                    continue;
                }
                Err(err) => {
                    warn!(proposal = %proposal.id, error = %err, "reminder claim failed");
                    summary.failed += 1;
                    continue;
                }
            }

            let text = render(&template.body, &proposal_vars(&proposal));
            match self.dispatcher.send(
                Channel::WhatsApp,
                &proposal.client_phone,
                template.subject.as_deref(),
                &text,
            ) {
                Ok(delivery) => {
                    debug!(proposal = %proposal.id, delivery = %delivery.0, "reminder sent");
                    summary.sent += 1;
                }
                Err(err) => {
                    warn!(proposal = %proposal.id, error = %err, "reminder send failed");
                    summary.failed += 1;
                }
            }

            // Pace the provider between messages, not after the final one.
            if index < last && !self.config.pace.is_zero() {
                std::thread::sleep(self.config.pace);
            }
        }

        info!(
            scanned = summary.scanned,
            sent = summary.sent,
            failed = summary.failed,
            "reminder sweep finished"
        );
        Ok(summary)
    }
}
