//! Service trait abstraction for lifecycle operations
//!
//! Control surfaces (a CLI, an HTTP layer) talk to the engine through
//! [`OutreachQueryService`] instead of the concrete [`LifecycleProcessor`],
//! so they can be tested against a mock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outreach_common::{EmailType, FollowUpStatus, LeadStatus, internal};
use outreach_store::{FollowUp, FollowUpId, FollowUpQuery, Lead, LeadId, LeadPatch};
use serde::Serialize;

use crate::{
    error::{DeliveryError, PermanentError},
    processor::{DeadLetterStats, FollowUpReport, LifecycleProcessor, QueueReport},
};

/// Lead counts per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub new: usize,
    pub scheduled: usize,
    pub sent: usize,
    pub failed: usize,
    pub bounced: usize,
    pub replied: usize,
    /// Failed leads still waiting for their retry time.
    pub pending_retry: usize,
    pub pending_followups: usize,
}

#[async_trait]
pub trait OutreachQueryService: Send + Sync {
    /// Process the send queue, then sweep due retries.
    async fn trigger_queue(&self) -> Result<QueueReport, DeliveryError>;

    async fn trigger_followups(&self) -> Result<FollowUpReport, DeliveryError>;

    /// Queue a `new` lead for its initial email at `at` (default: now).
    ///
    /// Leads in any other status are rejected.
    async fn enqueue_lead(
        &self,
        id: &LeadId,
        at: Option<DateTime<Utc>>,
    ) -> Result<Lead, DeliveryError>;

    /// Return a lead to `new`, clearing every lifecycle field and cancelling
    /// its pending follow-ups.
    async fn reset_lead(&self, id: &LeadId) -> Result<Lead, DeliveryError>;

    /// Record that the lead replied. Pending follow-ups are cancelled when
    /// they come due.
    async fn mark_reply_received(&self, id: &LeadId) -> Result<Lead, DeliveryError>;

    async fn queue_stats(&self) -> Result<QueueStats, DeliveryError>;

    async fn dead_letter_stats(&self) -> Result<DeadLetterStats, DeliveryError>;

    /// Follow-ups ordered by due date, optionally filtered.
    async fn list_followups(
        &self,
        lead: Option<LeadId>,
        status: Option<FollowUpStatus>,
    ) -> Result<Vec<FollowUp>, DeliveryError>;

    async fn cancel_followup(&self, id: &FollowUpId) -> Result<FollowUp, DeliveryError>;
}

#[async_trait]
impl OutreachQueryService for LifecycleProcessor {
    async fn trigger_queue(&self) -> Result<QueueReport, DeliveryError> {
        self.trigger_queue_at(Utc::now()).await
    }

    async fn trigger_followups(&self) -> Result<FollowUpReport, DeliveryError> {
        self.process_due_followups_at(Utc::now()).await
    }

    async fn enqueue_lead(
        &self,
        id: &LeadId,
        at: Option<DateTime<Utc>>,
    ) -> Result<Lead, DeliveryError> {
        let lead = self.store().get(id).await?;
        if lead.status != LeadStatus::New {
            return Err(PermanentError::Rejected(format!(
                "lead {id} is {}, only new leads can be enqueued",
                lead.status
            ))
            .into());
        }

        let at = at.unwrap_or_else(Utc::now);
        let patch = LeadPatch::new()
            .when_status(LeadStatus::New)
            .status(LeadStatus::Scheduled)
            .email_type(EmailType::Initial)
            .scheduled_time(Some(at));
        let lead = self.store().update(id, &patch).await?;

        internal!(level = INFO, lead_id = %id, scheduled_time = %at, "Lead enqueued");
        Ok(lead)
    }

    async fn reset_lead(&self, id: &LeadId) -> Result<Lead, DeliveryError> {
        let patch = LeadPatch::new()
            .status(LeadStatus::New)
            .email_type(EmailType::Initial)
            .content(None, None)
            .scheduled_time(None)
            .retry(0, None)
            .error_message(None)
            .sent(None, None, None);
        let lead = self.store().update(id, &patch).await?;
        let cancelled = self.cancel_pending_followups(*id, "lead reset").await?;

        internal!(level = INFO, lead_id = %id, cancelled, "Lead reset");
        Ok(lead)
    }

    async fn mark_reply_received(&self, id: &LeadId) -> Result<Lead, DeliveryError> {
        let patch = LeadPatch {
            next_retry_at: Some(None),
            ..LeadPatch::new().status(LeadStatus::ReplyReceived)
        };
        let lead = self.store().update(id, &patch).await?;

        internal!(level = INFO, lead_id = %id, "Reply recorded");
        Ok(lead)
    }

    async fn queue_stats(&self) -> Result<QueueStats, DeliveryError> {
        let counts = self.store().count_by_status().await?;
        let count = |status: LeadStatus| counts.get(&status).copied().unwrap_or_default();

        let dead_letter = self.dead_letter_stats_at(Utc::now()).await?;
        let pending_followups = self
            .store()
            .query_followups(&FollowUpQuery::pending())
            .await?
            .len();

        Ok(QueueStats {
            new: count(LeadStatus::New),
            scheduled: count(LeadStatus::Scheduled),
            sent: count(LeadStatus::Sent),
            failed: count(LeadStatus::Failed),
            bounced: count(LeadStatus::Bounced),
            replied: count(LeadStatus::ReplyReceived),
            pending_retry: dead_letter.pending_retry,
            pending_followups,
        })
    }

    async fn dead_letter_stats(&self) -> Result<DeadLetterStats, DeliveryError> {
        self.dead_letter_stats_at(Utc::now()).await
    }

    async fn list_followups(
        &self,
        lead: Option<LeadId>,
        status: Option<FollowUpStatus>,
    ) -> Result<Vec<FollowUp>, DeliveryError> {
        let query = FollowUpQuery {
            status,
            lead_id: lead,
            due_on_or_before: None,
        };
        Ok(self.store().query_followups(&query).await?)
    }

    async fn cancel_followup(&self, id: &FollowUpId) -> Result<FollowUp, DeliveryError> {
        LifecycleProcessor::cancel_followup(self, id).await
    }
}
