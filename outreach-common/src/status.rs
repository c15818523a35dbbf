//! Lifecycle status values shared by the store and the lifecycle processor.
//!
//! The serialized names match the values already present in lead tables
//! populated by the ingestion side (`scheduled`, `email_sent`, `reply_received`,
//! `followup_5day`, ...), so rows round-trip without a migration.

use core::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown {kind} value: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// Where a lead currently sits in the outreach lifecycle.
///
/// `sending` is deliberately absent: a lead that is mid-attempt keeps its
/// persisted status and is tracked only by the processor's in-flight set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Ingested, not yet queued for any send.
    New,
    /// Queued; eligible once `scheduled_time` has passed.
    #[serde(alias = "ready", alias = "queued")]
    Scheduled,
    /// The current `email_type` was delivered to the transport.
    #[serde(rename = "email_sent", alias = "sent")]
    Sent,
    /// The last attempt failed; a retry is pending at `next_retry_at`.
    Failed,
    /// Retry budget exhausted. Terminal for automation.
    Bounced,
    /// The reply detector saw an answer. Terminal for automation.
    ReplyReceived,
}

impl LeadStatus {
    pub const ALL: [Self; 6] = [
        Self::New,
        Self::Scheduled,
        Self::Sent,
        Self::Failed,
        Self::Bounced,
        Self::ReplyReceived,
    ];

    /// No automated component will act on a lead in this state again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Bounced | Self::ReplyReceived)
    }

    /// The lead has a send outstanding, either queued or awaiting retry.
    #[must_use]
    pub const fn is_outstanding(self) -> bool {
        matches!(self, Self::Scheduled | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Scheduled => "scheduled",
            Self::Sent => "email_sent",
            Self::Failed => "failed",
            Self::Bounced => "bounced",
            Self::ReplyReceived => "reply_received",
        }
    }
}

impl Display for LeadStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "scheduled" | "ready" | "queued" => Ok(Self::Scheduled),
            "email_sent" | "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "bounced" => Ok(Self::Bounced),
            "reply_received" | "replied" => Ok(Self::ReplyReceived),
            _ => Err(ParseStatusError {
                kind: "lead status",
                value: s.to_string(),
            }),
        }
    }
}

/// Which outreach stage an email represents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum EmailType {
    #[default]
    #[serde(rename = "initial")]
    Initial,
    #[serde(rename = "followup_5day")]
    Followup5Day,
    #[serde(rename = "followup_10day")]
    Followup10Day,
}

impl EmailType {
    #[must_use]
    pub const fn is_followup(self) -> bool {
        !matches!(self, Self::Initial)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Followup5Day => "followup_5day",
            Self::Followup10Day => "followup_10day",
        }
    }
}

impl Display for EmailType {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "initial" => Ok(Self::Initial),
            "followup_5day" => Ok(Self::Followup5Day),
            "followup_10day" => Ok(Self::Followup10Day),
            _ => Err(ParseStatusError {
                kind: "email type",
                value: s.to_string(),
            }),
        }
    }
}

/// The two follow-up stages scheduled after an initial send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FollowUpStage {
    #[serde(rename = "5day")]
    FiveDay,
    #[serde(rename = "10day")]
    TenDay,
}

impl FollowUpStage {
    pub const ALL: [Self; 2] = [Self::FiveDay, Self::TenDay];

    /// The email type a lead is rescheduled with when this stage comes due.
    #[must_use]
    pub const fn email_type(self) -> EmailType {
        match self {
            Self::FiveDay => EmailType::Followup5Day,
            Self::TenDay => EmailType::Followup10Day,
        }
    }
}

impl Display for FollowUpStage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::FiveDay => fmt.write_str("5day"),
            Self::TenDay => fmt.write_str("10day"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    Pending,
    Sent,
    Cancelled,
}

impl FollowUpStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for FollowUpStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => fmt.write_str("pending"),
            Self::Sent => fmt.write_str("sent"),
            Self::Cancelled => fmt.write_str("cancelled"),
        }
    }
}
