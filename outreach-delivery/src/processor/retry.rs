//! Dead-letter handling: recording failures and sweeping due retries
//!
//! A failed lead stays on its own row. `failed` with a `next_retry_at` is the
//! retry queue; `bounced` is the dead letter. A lead can therefore never be
//! queued and dead-lettered at the same time.

use chrono::{DateTime, Utc};
use outreach_common::{LeadStatus, audit, internal};
use outreach_store::{Lead, LeadPatch, LeadQuery};
use serde::Serialize;

use super::{LifecycleProcessor, QueueReport};
use crate::{
    error::{AttemptFailure, DeliveryError},
    policy::RetryDecision,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeadLetterStats {
    /// Leads currently `failed`, whether or not their retry is due.
    pub total_failed: usize,
    /// Failed leads whose retry time is still in the future.
    pub pending_retry: usize,
    /// Leads in `bounced`.
    pub permanently_failed: usize,
}

impl LifecycleProcessor {
    /// Record a failed attempt on `lead` and decide whether it is retried.
    ///
    /// The first failure for the current email type moves the lead to
    /// `failed` with `retry_count = 1`. Each later failure increments the
    /// count; reaching the attempt cap moves the lead to `bounced` with no
    /// retry time.
    ///
    /// # Errors
    /// If the lead cannot be updated. A concurrent change to the lead's status
    /// surfaces as a store conflict.
    pub async fn record_failure_at(
        &self,
        lead: &Lead,
        failure: &AttemptFailure,
        now: DateTime<Utc>,
    ) -> Result<RetryDecision, DeliveryError> {
        let decision = self
            .config
            .retry
            .decide(lead.status, lead.retry_count, &failure.error, now);
        let reason = failure.to_string();

        let patch = LeadPatch::new().when_status(lead.status);
        let (patch, status) = match decision {
            RetryDecision::Retry {
                retry_count,
                next_retry_at,
            } => (
                patch
                    .status(LeadStatus::Failed)
                    .retry(retry_count, Some(next_retry_at))
                    .error_message(Some(reason.clone())),
                LeadStatus::Failed,
            ),
            RetryDecision::Exhausted { retry_count } => (
                patch
                    .status(LeadStatus::Bounced)
                    .retry(retry_count, None)
                    .error_message(Some(format!("Max retries reached. Last error: {reason}"))),
                LeadStatus::Bounced,
            ),
        };

        self.store.update(&lead.id, &patch).await?;

        audit::log_send_failure(
            &lead.id.to_string(),
            lead.email_type.as_str(),
            &reason,
            decision.retry_count(),
            status.as_str(),
        );

        match decision {
            RetryDecision::Retry {
                retry_count,
                next_retry_at,
            } => internal!(
                level = WARN,
                lead_id = %lead.id,
                retry_count,
                %next_retry_at,
                error = %reason,
                "Send failed, retry scheduled"
            ),
            RetryDecision::Exhausted { retry_count } => internal!(
                level = ERROR,
                lead_id = %lead.id,
                retry_count,
                error = %reason,
                "Send failed permanently, lead moved to dead letter"
            ),
        }

        Ok(decision)
    }

    /// Failed leads whose retry time has been reached, earliest first.
    ///
    /// # Errors
    /// If the store cannot be queried.
    pub async fn select_due_at(&self, now: DateTime<Utc>) -> Result<Vec<Lead>, DeliveryError> {
        let mut leads = self
            .store
            .query(&LeadQuery::status(LeadStatus::Failed).retry_due_before(now))
            .await?;
        leads.sort_by_key(|lead| lead.next_retry_at);
        Ok(leads)
    }

    /// Re-attempt every due failed lead through the normal send path.
    ///
    /// # Errors
    /// Only if the due set cannot be read.
    pub async fn retry_due_at(&self, now: DateTime<Utc>) -> Result<QueueReport, DeliveryError> {
        let _pass = self.pass_lock.lock().await;
        self.run_retries(now).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub(super) async fn run_retries(&self, now: DateTime<Utc>) -> Result<QueueReport, DeliveryError> {
        let due = self.select_due_at(now).await?;
        internal!(level = DEBUG, count = due.len(), "Sweeping due retries");

        let mut report = QueueReport::default();
        for lead in due {
            self.attempt_into(&mut report, lead.id, now).await;
        }

        Ok(report)
    }

    /// # Errors
    /// If the store cannot be queried.
    pub async fn dead_letter_stats_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DeadLetterStats, DeliveryError> {
        let failed = self
            .store
            .query(&LeadQuery::status(LeadStatus::Failed))
            .await?;
        let permanently_failed = self
            .store
            .count(&LeadQuery::status(LeadStatus::Bounced))
            .await?;

        Ok(DeadLetterStats {
            total_failed: failed.len(),
            pending_retry: failed
                .iter()
                .filter(|lead| lead.next_retry_at.is_some_and(|at| at > now))
                .count(),
            permanently_failed,
        })
    }
}
