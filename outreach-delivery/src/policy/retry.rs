//! Retry policy for failed sends.
//!
//! Failed sends are retried on a fixed delay table rather than an open-ended
//! exponential curve: the retry count indexes the table, clamped to its last
//! entry. Once the count reaches `max_attempts` the lead is dead-lettered
//! (`bounced`) and never touched by automation again.

use chrono::{DateTime, Duration, Utc};
use outreach_common::LeadStatus;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, SystemError};

/// Thirty days. Longer delays are rejected at startup.
const MAX_DELAY_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Failures tolerated for one email type before the lead is bounced.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before each retry (in seconds), indexed by `retry_count - 1`.
    ///
    /// Default: `[3600, 7200, 14400]` (1h, 2h, 4h)
    #[serde(default = "defaults::delays_secs")]
    pub delays_secs: Vec<u64>,

    /// Randomise each delay within ±`jitter_factor`.
    ///
    /// Default: 0.0 (exact delays)
    #[serde(default)]
    pub jitter_factor: f64,

    /// Bounce immediately on a permanent error instead of spending the
    /// remaining attempts.
    ///
    /// Default: `false`, every failure consumes one attempt
    #[serde(default)]
    pub fast_fail_permanent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            delays_secs: defaults::delays_secs(),
            jitter_factor: 0.0,
            fast_fail_permanent: false,
        }
    }
}

/// What to do with a lead after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stay `failed` and try again at `next_retry_at`.
    Retry {
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    },
    /// Move to `bounced`; no further automated action.
    Exhausted { retry_count: u32 },
}

impl RetryDecision {
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        match self {
            Self::Retry { retry_count, .. } | Self::Exhausted { retry_count } => *retry_count,
        }
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// If `max_attempts` is zero, the delay table is empty or holds a delay
    /// outside one second to thirty days, or the jitter factor is outside
    /// `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        if self.max_attempts == 0 {
            return Err(
                SystemError::Configuration("retry.max_attempts must be at least 1".into()).into(),
            );
        }
        if self.delays_secs.is_empty()
            || self
                .delays_secs
                .iter()
                .any(|delay| *delay == 0 || *delay > MAX_DELAY_SECS.unsigned_abs())
        {
            return Err(SystemError::Configuration(format!(
                "retry.delays_secs must be non-empty with every delay within 1..={MAX_DELAY_SECS}"
            ))
            .into());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(SystemError::Configuration(format!(
                "retry.jitter_factor must be within 0.0..=1.0, got {}",
                self.jitter_factor
            ))
            .into());
        }
        Ok(())
    }

    /// `true` once `retry_count` failures have used up the budget.
    #[must_use]
    pub const fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_attempts
    }

    #[must_use]
    pub const fn remaining_attempts(&self, retry_count: u32) -> u32 {
        self.max_attempts.saturating_sub(retry_count)
    }

    /// Delay before the retry that follows failure number `retry_count` (1-based).
    ///
    /// Indexes the delay table with `retry_count - 1`, clamped to the last entry.
    #[must_use]
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let index = usize::try_from(retry_count.saturating_sub(1))
            .unwrap_or(usize::MAX)
            .min(self.delays_secs.len().saturating_sub(1));
        let base = self.delays_secs.get(index).copied().unwrap_or(3600);

        i64::try_from(self.jitter(base))
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::seconds(MAX_DELAY_SECS))
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn jitter(&self, delay: u64) -> u64 {
        if self.jitter_factor <= 0.0 {
            return delay;
        }

        let range = (delay as f64) * self.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-range..=range);
        ((delay as f64) + jitter).max(1.0) as u64
    }

    /// Decide the outcome of a failure on a lead currently in `status` with
    /// `retry_count` recorded failures.
    ///
    /// A lead that is not already `failed` is on its first failure for the
    /// current email type, whatever stale count it carries.
    #[must_use]
    pub fn decide(
        &self,
        status: LeadStatus,
        retry_count: u32,
        error: &DeliveryError,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        let retry_count = if status == LeadStatus::Failed && retry_count > 0 {
            retry_count.saturating_add(1)
        } else {
            1
        };

        if self.is_exhausted(retry_count) || (self.fast_fail_permanent && error.is_permanent()) {
            return RetryDecision::Exhausted { retry_count };
        }

        RetryDecision::Retry {
            retry_count,
            next_retry_at: now + self.delay_for(retry_count),
        }
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub fn delays_secs() -> Vec<u64> {
        vec![3600, 7200, 14400]
    }
}
