//! Audit events for the outreach lifecycle.
//!
//! Every externally visible action on a lead (a send attempt, its outcome, a
//! follow-up transition) is emitted as a structured `tracing` event under the
//! `outreach_common::audit` target, so operators can reconstruct what was sent
//! to whom and why a lead stopped receiving mail.
//!
//! ## PII Redaction
//!
//! Recipient addresses are redacted by default. Set `redact_recipients: false`
//! in the `audit` section of the configuration to log them verbatim.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Emit audit events at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Replace the local part of recipient addresses
    #[serde(default = "default_true")]
    pub redact_recipients: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_recipients: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

static AUDIT_CONFIG: OnceLock<Arc<AuditConfig>> = OnceLock::new();

/// Install the audit configuration. Only the first call has an effect.
pub fn init(config: AuditConfig) {
    AUDIT_CONFIG.get_or_init(|| Arc::new(config));
}

#[must_use]
pub fn config() -> Arc<AuditConfig> {
    AUDIT_CONFIG
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(AuditConfig::default()))
}

/// Keep the first character of the local part and the domain.
///
/// `jane.doe@example.com` becomes `j***@example.com`.
#[must_use]
pub fn redact_email(email: &str, redact: bool) -> String {
    if !redact {
        return email.to_string();
    }

    match email.split_once('@') {
        Some((local, domain)) => local.chars().next().map_or_else(
            || format!("***@{domain}"),
            |first| format!("{first}***@{domain}"),
        ),
        None => "[REDACTED]".to_string(),
    }
}

/// A send is about to be handed to the transport.
///
/// `attempt` is 1-based and counts attempts for the current email type.
pub fn log_send_attempt(lead_id: &str, recipient: &str, email_type: &str, attempt: u32) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "SendAttempt",
        lead_id = %lead_id,
        recipient = %redact_email(recipient, config.redact_recipients),
        email_type = %email_type,
        attempt,
        "Audit: Send attempt"
    );
}

pub fn log_send_success(
    lead_id: &str,
    recipient: &str,
    email_type: &str,
    message_id: Option<&str>,
    duration_ms: u128,
) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "SendSuccess",
        lead_id = %lead_id,
        recipient = %redact_email(recipient, config.redact_recipients),
        email_type = %email_type,
        message_id = message_id.unwrap_or("-"),
        duration_ms,
        "Audit: Send successful"
    );
}

/// A send attempt failed. `status` is the lead status after the failure was recorded.
pub fn log_send_failure(lead_id: &str, email_type: &str, error: &str, retry_count: u32, status: &str) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "SendFailure",
        lead_id = %lead_id,
        email_type = %email_type,
        error = %error,
        retry_count,
        status = %status,
        "Audit: Send failed"
    );
}

/// A follow-up left `pending`, either promoted into the send queue or cancelled.
pub fn log_followup_transition(followup_id: &str, lead_id: &str, stage: &str, outcome: &str) {
    let config = config();
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "FollowUpTransition",
        followup_id = %followup_id,
        lead_id = %lead_id,
        stage = %stage,
        outcome = %outcome,
        "Audit: Follow-up transition"
    );
}
