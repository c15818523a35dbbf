//! Queue processing: selecting eligible leads and attempting their sends

use std::time::Instant;

use chrono::{DateTime, Utc};
use outreach_common::{EmailType, LeadStatus, audit, internal, outgoing};
use outreach_store::{Lead, LeadId, LeadPatch, LeadQuery, StoreError};
use serde::Serialize;

use super::LifecycleProcessor;
use crate::{
    adapters::{GeneratedEmail, OutboundEmail, SendReceipt},
    error::{AttemptFailure, DeliveryError, FailureStage, PermanentError, SystemError, TemporaryError},
    policy::{GateReason, RetryDecision},
};

/// Why an attempt did nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another attempt on the same lead is still running.
    InFlight,
    /// The lead is not (or no longer) due; it currently has this status.
    NotEligible(LeadStatus),
}

/// The result of one send attempt on one lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Sent {
        message_id: Option<String>,
        followups_scheduled: usize,
    },
    /// Outside business hours; the lead was left untouched.
    Gated(GateReason),
    Failed {
        stage: FailureStage,
        decision: RetryDecision,
    },
    Skipped(SkipReason),
}

/// Aggregate counts for one queue (and retry) pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueReport {
    pub processed: usize,
    pub sent: usize,
    pub gated: usize,
    /// Every failed attempt, whatever the stage.
    pub failed: usize,
    pub missing_recipient: usize,
    pub generation_failures: usize,
    pub transport_failures: usize,
    /// Failures that moved the lead to `bounced`.
    pub bounced: usize,
    pub skipped: usize,
    /// Attempts that stopped on a store error.
    pub errors: usize,
    /// Of `processed`, how many came from the retry sweep.
    pub retried: usize,
}

impl QueueReport {
    pub fn record(&mut self, outcome: &AttemptOutcome) {
        self.processed += 1;

        match outcome {
            AttemptOutcome::Sent { .. } => self.sent += 1,
            AttemptOutcome::Gated(_) => self.gated += 1,
            AttemptOutcome::Skipped(_) => self.skipped += 1,
            AttemptOutcome::Failed { stage, decision } => {
                self.failed += 1;
                match stage {
                    FailureStage::Validation => self.missing_recipient += 1,
                    FailureStage::Generation => self.generation_failures += 1,
                    FailureStage::Transport => self.transport_failures += 1,
                }
                if decision.is_exhausted() {
                    self.bounced += 1;
                }
            }
        }
    }

    /// An attempt that ended in a store error. It counts as a failure.
    pub fn record_error(&mut self) {
        self.processed += 1;
        self.failed += 1;
        self.errors += 1;
    }

    /// Fold the report of a retry sweep into this one.
    pub fn absorb_retries(&mut self, retries: &Self) {
        self.processed += retries.processed;
        self.sent += retries.sent;
        self.gated += retries.gated;
        self.failed += retries.failed;
        self.missing_recipient += retries.missing_recipient;
        self.generation_failures += retries.generation_failures;
        self.transport_failures += retries.transport_failures;
        self.bounced += retries.bounced;
        self.skipped += retries.skipped;
        self.errors += retries.errors;
        self.retried += retries.processed;
    }
}

/// Whether `lead` may be attempted at `now`: queued and due, or failed with
/// its retry time reached.
fn is_due(lead: &Lead, now: DateTime<Utc>) -> bool {
    match lead.status {
        LeadStatus::Scheduled => lead.scheduled_time.is_none_or(|at| at <= now),
        LeadStatus::Failed => lead.next_retry_at.is_some_and(|at| at <= now),
        _ => false,
    }
}

/// 1-based attempt number for the lead's current email type.
const fn attempt_number(lead: &Lead) -> u32 {
    match lead.status {
        LeadStatus::Failed => lead.retry_count.saturating_add(1),
        _ => 1,
    }
}

impl LifecycleProcessor {
    /// Scheduled leads due at `now`, earliest `scheduled_time` first.
    ///
    /// # Errors
    /// If the store cannot be queried.
    pub async fn select_eligible_at(&self, now: DateTime<Utc>) -> Result<Vec<Lead>, DeliveryError> {
        let mut leads = self
            .store
            .query(&LeadQuery::status(LeadStatus::Scheduled).scheduled_before(now))
            .await?;
        leads.sort_by_key(|lead| lead.scheduled_time);
        Ok(leads)
    }

    /// Send every eligible lead once.
    ///
    /// # Errors
    /// Only if the eligible set cannot be read. Per-lead problems are counted.
    pub async fn process_queue_at(&self, now: DateTime<Utc>) -> Result<QueueReport, DeliveryError> {
        let _pass = self.pass_lock.lock().await;
        self.run_queue(now).await
    }

    /// `process_queue_at` followed by `retry_due_at`, under one lock.
    ///
    /// # Errors
    /// If either candidate set cannot be read.
    pub async fn trigger_queue_at(&self, now: DateTime<Utc>) -> Result<QueueReport, DeliveryError> {
        let _pass = self.pass_lock.lock().await;

        let mut report = self.run_queue(now).await?;
        let retries = self.run_retries(now).await?;
        report.absorb_retries(&retries);

        Ok(report)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub(super) async fn run_queue(&self, now: DateTime<Utc>) -> Result<QueueReport, DeliveryError> {
        let eligible = self.select_eligible_at(now).await?;
        internal!(level = DEBUG, count = eligible.len(), "Processing send queue");

        let mut report = QueueReport::default();
        for lead in eligible {
            self.attempt_into(&mut report, lead.id, now).await;
        }

        Ok(report)
    }

    /// Attempt one lead and count the result; store errors are logged and
    /// counted so the rest of the pass continues.
    pub(super) async fn attempt_into(
        &self,
        report: &mut QueueReport,
        lead_id: LeadId,
        now: DateTime<Utc>,
    ) {
        match self.attempt_send_at(lead_id, now, false).await {
            Ok(outcome) => report.record(&outcome),
            Err(e) => {
                internal!(level = ERROR, %lead_id, error = %e, "Send attempt aborted");
                report.record_error();
            }
        }
    }

    /// Attempt to send the lead's current email now.
    ///
    /// # Errors
    /// See [`attempt_send_at`](Self::attempt_send_at).
    pub async fn attempt_send(&self, lead_id: LeadId) -> Result<AttemptOutcome, DeliveryError> {
        self.attempt_send_at(lead_id, Utc::now(), false).await
    }

    /// Attempt to send the lead's current email at `now`.
    ///
    /// A lead that is not due (already sent, not yet scheduled, waiting for its
    /// retry time) is skipped without any external call or state change.
    /// Outside business hours the lead is left as it is. Otherwise content is
    /// generated when missing (or when `regenerate` is set), the email is sent,
    /// and the result is recorded on the lead.
    ///
    /// # Errors
    /// Only store failures. Generation and transport failures are recorded on
    /// the lead and reported as [`AttemptOutcome::Failed`].
    #[tracing::instrument(level = "debug", skip(self, now))]
    pub async fn attempt_send_at(
        &self,
        lead_id: LeadId,
        now: DateTime<Utc>,
        regenerate: bool,
    ) -> Result<AttemptOutcome, DeliveryError> {
        let Some(_claim) = self.claim(lead_id) else {
            internal!(level = DEBUG, %lead_id, "Attempt already in flight, skipping");
            return Ok(AttemptOutcome::Skipped(SkipReason::InFlight));
        };

        match self.attempt_claimed(lead_id, now, regenerate).await {
            Err(DeliveryError::System(SystemError::Store(StoreError::Conflict {
                expected,
                actual,
                ..
            }))) => {
                internal!(
                    level = WARN,
                    %lead_id,
                    %expected,
                    %actual,
                    "Lead changed while its attempt was in progress"
                );
                Ok(AttemptOutcome::Skipped(SkipReason::NotEligible(actual)))
            }
            other => other,
        }
    }

    async fn attempt_claimed(
        &self,
        lead_id: LeadId,
        now: DateTime<Utc>,
        regenerate: bool,
    ) -> Result<AttemptOutcome, DeliveryError> {
        let lead = self.store.get(&lead_id).await?;
        if !is_due(&lead, now) {
            internal!(level = DEBUG, %lead_id, status = %lead.status, "Lead is not due, skipping");
            return Ok(AttemptOutcome::Skipped(SkipReason::NotEligible(lead.status)));
        }

        let region = self.regions.resolve(lead.country.as_deref());
        let check = self.config.business_hours.check(region.timezone, now);
        if let Some(reason) = check.reason {
            internal!(
                level = DEBUG,
                %lead_id,
                timezone = %region.timezone,
                local_time = %check.local_time,
                %reason,
                "Outside business hours, leaving lead queued"
            );
            return Ok(AttemptOutcome::Gated(reason));
        }

        let Some(recipient) = lead.recipient() else {
            let error = PermanentError::MissingRecipient(lead_id.to_string());
            return self
                .fail(&lead, AttemptFailure::new(FailureStage::Validation, error.into()), now)
                .await;
        };

        let content = match lead.content() {
            Some((subject, body)) if !regenerate => GeneratedEmail {
                subject: subject.to_string(),
                body: body.to_string(),
            },
            _ => match self.generate(&lead).await {
                Ok(generated) => {
                    let patch = LeadPatch::new()
                        .when_status(lead.status)
                        .content(Some(generated.subject.clone()), Some(generated.body.clone()));
                    self.store.update(&lead_id, &patch).await?;
                    generated
                }
                Err(error) => {
                    return self
                        .fail(&lead, AttemptFailure::new(FailureStage::Generation, error), now)
                        .await;
                }
            },
        };

        let email = OutboundEmail {
            lead_id,
            email_type: lead.email_type,
            recipient: recipient.to_string(),
            subject: content.subject,
            body: content.body,
        };

        audit::log_send_attempt(
            &lead_id.to_string(),
            &email.recipient,
            email.email_type.as_str(),
            attempt_number(&lead),
        );

        let started = Instant::now();
        match self.send(&email).await {
            Ok(receipt) => self.succeed(&lead, &email, receipt, now, started).await,
            Err(error) => {
                self.fail(&lead, AttemptFailure::new(FailureStage::Transport, error), now)
                    .await
            }
        }
    }

    async fn generate(&self, lead: &Lead) -> Result<GeneratedEmail, DeliveryError> {
        let timeout = self.config.timeouts.generate_timeout();
        outgoing!(level = DEBUG, lead_id = %lead.id, email_type = %lead.email_type, "Generating content");

        tokio::time::timeout(
            timeout,
            self.generator
                .generate(lead, lead.website_context.as_deref(), lead.email_type),
        )
        .await
        .map_err(|_| {
            TemporaryError::Timeout(format!(
                "content generation exceeded {}s",
                timeout.as_secs()
            ))
        })?
    }

    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, DeliveryError> {
        let timeout = self.config.timeouts.send_timeout();
        outgoing!(level = DEBUG, lead_id = %email.lead_id, email_type = %email.email_type, "Sending email");

        tokio::time::timeout(timeout, self.transport.send(email))
            .await
            .map_err(|_| TemporaryError::Timeout(format!("send exceeded {}s", timeout.as_secs())))?
    }

    async fn succeed(
        &self,
        lead: &Lead,
        email: &OutboundEmail,
        receipt: SendReceipt,
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<AttemptOutcome, DeliveryError> {
        let patch = LeadPatch::new()
            .when_status(lead.status)
            .status(LeadStatus::Sent)
            .sent(
                Some(now),
                receipt.message_id.clone(),
                receipt.thread_id.clone(),
            )
            .retry(0, None)
            .error_message(None);
        let sent = self.store.update(&lead.id, &patch).await?;

        audit::log_send_success(
            &lead.id.to_string(),
            &email.recipient,
            email.email_type.as_str(),
            receipt.message_id.as_deref(),
            started.elapsed().as_millis(),
        );

        // The email is out; a follow-up problem must not report it as failed.
        let followups_scheduled = if sent.email_type == EmailType::Initial {
            self.schedule_followups(&sent).await.unwrap_or_else(|e| {
                internal!(
                    level = ERROR,
                    lead_id = %lead.id,
                    error = %e,
                    "Email sent but its follow-ups could not be scheduled"
                );
                0
            })
        } else {
            0
        };

        internal!(
            level = INFO,
            lead_id = %lead.id,
            email_type = %email.email_type,
            message_id = receipt.message_id.as_deref(),
            followups_scheduled,
            "Email sent"
        );

        Ok(AttemptOutcome::Sent {
            message_id: receipt.message_id,
            followups_scheduled,
        })
    }

    async fn fail(
        &self,
        lead: &Lead,
        failure: AttemptFailure,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, DeliveryError> {
        let stage = failure.stage;
        let decision = self.record_failure_at(lead, &failure, now).await?;
        Ok(AttemptOutcome::Failed { stage, decision })
    }
}
