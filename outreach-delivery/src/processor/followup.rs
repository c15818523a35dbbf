//! Follow-up scheduling and promotion
//!
//! An initial send that succeeds creates exactly two pending follow-ups. When
//! one comes due, the lead is put back in the send queue with the follow-up's
//! email type. Follow-up sends never schedule further follow-ups.

use chrono::{DateTime, Duration, Utc};
use outreach_common::{FollowUpStage, FollowUpStatus, LeadStatus, audit, internal};
use outreach_store::{FollowUp, FollowUpId, FollowUpQuery, Lead, LeadId, LeadPatch, StoreError};
use serde::{Deserialize, Serialize};

use super::LifecycleProcessor;
use crate::error::{DeliveryError, SystemError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpConfig {
    /// Days after the initial send for the first follow-up.
    ///
    /// Default: 5
    #[serde(default = "defaults::first_delay_days")]
    pub first_delay_days: u32,

    /// Days after the initial send for the second follow-up.
    ///
    /// Default: 10
    #[serde(default = "defaults::second_delay_days")]
    pub second_delay_days: u32,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            first_delay_days: defaults::first_delay_days(),
            second_delay_days: defaults::second_delay_days(),
        }
    }
}

impl FollowUpConfig {
    /// # Errors
    /// Unless `0 < first_delay_days < second_delay_days <= 365`.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        if self.first_delay_days == 0
            || self.first_delay_days >= self.second_delay_days
            || self.second_delay_days > 365
        {
            return Err(SystemError::Configuration(format!(
                "followups must satisfy 0 < first_delay_days < second_delay_days <= 365, got {} and {}",
                self.first_delay_days, self.second_delay_days
            ))
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub fn delay_for(&self, stage: FollowUpStage) -> Duration {
        let days = match stage {
            FollowUpStage::FiveDay => self.first_delay_days,
            FollowUpStage::TenDay => self.second_delay_days,
        };
        Duration::days(i64::from(days))
    }
}

/// Aggregate counts for one follow-up pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FollowUpReport {
    pub processed: usize,
    /// Leads put back in the send queue.
    pub promoted: usize,
    pub cancelled: usize,
    /// Left pending because the lead still has an outstanding send.
    pub deferred: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowUpOutcome {
    Promoted,
    Cancelled,
    Deferred,
}

impl LifecycleProcessor {
    /// Create the follow-ups for a lead whose initial email was just sent.
    ///
    /// Follow-ups that already exist for the same send are left alone, so
    /// calling this twice creates nothing new.
    ///
    /// # Errors
    /// If the lead has no `sent_at` or the store rejects an insert.
    pub async fn schedule_followups(&self, lead: &Lead) -> Result<usize, DeliveryError> {
        let Some(sent_at) = lead.sent_at else {
            return Err(SystemError::Internal(format!(
                "lead {} has no sent_at to schedule follow-ups from",
                lead.id
            ))
            .into());
        };

        let mut created = 0;
        for stage in FollowUpStage::ALL {
            let followup = FollowUp::pending(
                lead.id,
                stage,
                sent_at,
                lead.gmail_message_id.clone(),
                sent_at + self.config.followups.delay_for(stage),
            );

            match self.store.insert_followup(&followup).await {
                Ok(id) => {
                    internal!(
                        level = DEBUG,
                        lead_id = %lead.id,
                        followup_id = %id,
                        %stage,
                        due_at = %followup.due_at,
                        "Follow-up scheduled"
                    );
                    created += 1;
                }
                Err(StoreError::AlreadyExists(existing)) => {
                    internal!(level = DEBUG, lead_id = %lead.id, %stage, %existing, "Follow-up already scheduled");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(created)
    }

    /// Promote or cancel every pending follow-up due on or before `now`'s date.
    ///
    /// # Errors
    /// Only if the due set cannot be read. Per-follow-up problems are counted.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn process_due_followups_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<FollowUpReport, DeliveryError> {
        let _pass = self.pass_lock.lock().await;

        let due = self
            .store
            .query_followups(&FollowUpQuery::pending().due_on_or_before(now.date_naive()))
            .await?;
        internal!(level = DEBUG, count = due.len(), "Processing due follow-ups");

        let mut report = FollowUpReport::default();
        for followup in due {
            report.processed += 1;

            match self.handle_followup(&followup, now).await {
                Ok(FollowUpOutcome::Promoted) => report.promoted += 1,
                Ok(FollowUpOutcome::Cancelled) => report.cancelled += 1,
                Ok(FollowUpOutcome::Deferred) => report.deferred += 1,
                Err(e) => {
                    internal!(
                        level = ERROR,
                        followup_id = %followup.id,
                        lead_id = %followup.lead_id,
                        error = %e,
                        "Follow-up processing failed"
                    );
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    async fn handle_followup(
        &self,
        followup: &FollowUp,
        now: DateTime<Utc>,
    ) -> Result<FollowUpOutcome, DeliveryError> {
        let lead = match self.store.get(&followup.lead_id).await {
            Ok(lead) => lead,
            Err(e) if e.is_not_found() => {
                self.close_followup(followup, "lead no longer exists").await?;
                return Ok(FollowUpOutcome::Cancelled);
            }
            Err(e) => return Err(e.into()),
        };

        match lead.status {
            LeadStatus::Sent => {}
            LeadStatus::Scheduled | LeadStatus::Failed => {
                internal!(
                    level = DEBUG,
                    followup_id = %followup.id,
                    lead_id = %lead.id,
                    status = %lead.status,
                    "Lead has an outstanding send, deferring follow-up"
                );
                return Ok(FollowUpOutcome::Deferred);
            }
            LeadStatus::New | LeadStatus::Bounced | LeadStatus::ReplyReceived => {
                self.close_followup(followup, &format!("lead is {}", lead.status))
                    .await?;
                return Ok(FollowUpOutcome::Cancelled);
            }
        }

        let patch = LeadPatch::new()
            .when_status(LeadStatus::Sent)
            .status(LeadStatus::Scheduled)
            .email_type(followup.stage.email_type())
            .scheduled_time(Some(now))
            .content(None, None)
            .retry(0, None)
            .error_message(None);
        self.store.update(&lead.id, &patch).await?;

        // The lead is queued for this stage now. A follow-up left pending
        // would be promoted again once that send succeeds.
        if let Err(e) = self
            .store
            .transition_followup(&followup.id, FollowUpStatus::Sent, None)
            .await
        {
            internal!(
                level = ERROR,
                followup_id = %followup.id,
                lead_id = %lead.id,
                error = %e,
                "Follow-up promoted but not marked sent, cancelling it"
            );
            if let Err(cancel) = self
                .store
                .transition_followup(
                    &followup.id,
                    FollowUpStatus::Cancelled,
                    Some("promoted, sent status not recorded".to_string()),
                )
                .await
            {
                internal!(
                    level = ERROR,
                    followup_id = %followup.id,
                    lead_id = %lead.id,
                    error = %cancel,
                    "Follow-up could not be cancelled and may be promoted again"
                );
            }
            return Err(e.into());
        }

        audit::log_followup_transition(
            &followup.id.to_string(),
            &lead.id.to_string(),
            &followup.stage.to_string(),
            "promoted",
        );
        internal!(
            level = INFO,
            followup_id = %followup.id,
            lead_id = %lead.id,
            stage = %followup.stage,
            "Follow-up promoted to the send queue"
        );

        Ok(FollowUpOutcome::Promoted)
    }

    async fn close_followup(&self, followup: &FollowUp, note: &str) -> Result<(), DeliveryError> {
        self.store
            .transition_followup(&followup.id, FollowUpStatus::Cancelled, Some(note.to_string()))
            .await?;

        audit::log_followup_transition(
            &followup.id.to_string(),
            &followup.lead_id.to_string(),
            &followup.stage.to_string(),
            "cancelled",
        );
        internal!(
            level = INFO,
            followup_id = %followup.id,
            lead_id = %followup.lead_id,
            note,
            "Follow-up cancelled"
        );

        Ok(())
    }

    /// Cancel a follow-up. A follow-up that is already sent or cancelled is
    /// returned as it is.
    ///
    /// # Errors
    /// If the follow-up does not exist or the store fails.
    pub async fn cancel_followup(&self, id: &FollowUpId) -> Result<FollowUp, DeliveryError> {
        let followup = self.store.get_followup(id).await?;
        if followup.status.is_terminal() {
            return Ok(followup);
        }

        self.close_followup(&followup, "cancelled by operator").await?;
        Ok(self.store.get_followup(id).await?)
    }

    /// Cancel every pending follow-up of `lead_id`.
    ///
    /// # Errors
    /// If the store fails.
    pub async fn cancel_pending_followups(
        &self,
        lead_id: LeadId,
        note: &str,
    ) -> Result<usize, DeliveryError> {
        let pending = self
            .store
            .query_followups(&FollowUpQuery::pending().for_lead(lead_id))
            .await?;

        for followup in &pending {
            self.close_followup(followup, note).await?;
        }

        Ok(pending.len())
    }
}

mod defaults {
    pub const fn first_delay_days() -> u32 {
        5
    }

    pub const fn second_delay_days() -> u32 {
        10
    }
}
