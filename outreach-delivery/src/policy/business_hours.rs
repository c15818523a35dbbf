//! Business-hours gate.
//!
//! Sends only fire Monday to Friday, between `start_hour` (inclusive) and
//! `end_hour` (exclusive) in the lead's local time. Falling outside the window
//! is a scheduling decision, not a failure: the lead stays queued and is
//! reconsidered on the next pass.

use core::fmt::{self, Display, Formatter};

use ahash::AHashMap;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, SystemError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    /// First local hour in which sends may fire.
    ///
    /// Default: 9
    #[serde(default = "defaults::start_hour")]
    pub start_hour: u32,

    /// Local hour at which the window closes.
    ///
    /// Default: 19
    #[serde(default = "defaults::end_hour")]
    pub end_hour: u32,

    /// Extra `country → IANA zone` mappings, consulted before the built-in table.
    #[serde(default)]
    pub timezone_overrides: AHashMap<String, String>,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: defaults::start_hour(),
            end_hour: defaults::end_hour(),
            timezone_overrides: AHashMap::new(),
        }
    }
}

impl BusinessHours {
    /// # Errors
    /// Unless `start_hour < end_hour <= 24`.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(SystemError::Configuration(format!(
                "business_hours must satisfy start_hour < end_hour <= 24, got {}..{}",
                self.start_hour, self.end_hour
            ))
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub fn check(&self, timezone: Tz, now: DateTime<Utc>) -> BusinessHoursCheck {
        is_business_hours(timezone, now, self.start_hour, self.end_hour)
    }
}

/// Why a send was held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    Weekend { day: Weekday },
    TooEarly { hour: u32, start: u32 },
    TooLate { hour: u32, end: u32 },
}

impl Display for GateReason {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekend { day } => write!(fmt, "It's {} (weekend)", weekday_name(*day)),
            Self::TooEarly { hour, start } => write!(fmt, "Too early ({hour}:00 < {start}:00)"),
            Self::TooLate { hour, end } => write!(fmt, "Too late ({hour}:00 >= {end}:00)"),
        }
    }
}

const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessHoursCheck {
    pub allowed: bool,
    pub reason: Option<GateReason>,
    /// `now` as seen in the evaluated timezone.
    pub local_time: DateTime<Tz>,
}

/// Evaluate the business-hours policy for `now` in `timezone`.
///
/// Pure and deterministic: the same inputs always produce the same result.
#[must_use]
pub fn is_business_hours(
    timezone: Tz,
    now: DateTime<Utc>,
    start_hour: u32,
    end_hour: u32,
) -> BusinessHoursCheck {
    let local_time = now.with_timezone(&timezone);
    let day = local_time.weekday();
    let hour = local_time.hour();

    let reason = if matches!(day, Weekday::Sat | Weekday::Sun) {
        Some(GateReason::Weekend { day })
    } else if hour < start_hour {
        Some(GateReason::TooEarly {
            hour,
            start: start_hour,
        })
    } else if hour >= end_hour {
        Some(GateReason::TooLate { hour, end: end_hour })
    } else {
        None
    };

    BusinessHoursCheck {
        allowed: reason.is_none(),
        reason,
        local_time,
    }
}

mod defaults {
    pub const fn start_hour() -> u32 {
        9
    }

    pub const fn end_hour() -> u32 {
        19
    }
}
