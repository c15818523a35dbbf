//! Scheduling policies.
//!
//! Each policy is a plain configuration value plus pure decision functions,
//! so it can be tested without a store, adapters or a clock:
//! - [`retry`]: delay table and dead-letter cutoff for failed sends
//! - [`business_hours`]: the weekday/local-hour send window
//! - [`timezone`]: region to timezone resolution feeding the window

pub mod business_hours;
pub mod retry;
pub mod timezone;

pub use business_hours::{BusinessHours, BusinessHoursCheck, GateReason, is_business_hours};
pub use retry::{RetryDecision, RetryPolicy};
pub use timezone::{RegionResolver, TimezoneResolution, timezone_for_country};
