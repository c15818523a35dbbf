//! Lifecycle processor orchestration
//!
//! The processor owns the three passes that move leads through their
//! lifecycle:
//! - [`process`]: send eligible `scheduled` leads
//! - [`retry`]: re-attempt `failed` leads whose retry time has come, and
//!   dead-letter the ones that ran out of attempts
//! - [`followup`]: turn due follow-ups back into scheduled sends
//!
//! Every pass takes the same lock, so passes never overlap, whether they were
//! started by the periodic driver or by a manual trigger.

pub mod followup;
pub mod process;
pub mod retry;

use std::{ops::ControlFlow, sync::Arc, time::Duration};

use chrono::Utc;
use dashmap::DashSet;
use outreach_common::{Signal, config::AdapterTimeouts, internal};
use outreach_store::{LeadId, Store};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex, broadcast},
    time::MissedTickBehavior,
};

pub use followup::{FollowUpConfig, FollowUpReport};
pub use process::{AttemptOutcome, QueueReport, SkipReason};
pub use retry::DeadLetterStats;

use crate::{
    adapters::{ContentGenerator, SendTransport},
    error::DeliveryError,
    policy::{BusinessHours, RegionResolver, RetryPolicy},
};

/// How long shutdown waits for an in-progress pass.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// How often to send the queue and sweep due retries (in seconds)
    ///
    /// Default: 7200 (2 hours)
    #[serde(default = "defaults::queue_interval_secs")]
    pub queue_interval_secs: u64,

    /// How often to promote due follow-ups (in seconds)
    ///
    /// Default: 86400 (daily)
    #[serde(default = "defaults::followup_interval_secs")]
    pub followup_interval_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub business_hours: BusinessHours,

    #[serde(default)]
    pub followups: FollowUpConfig,

    #[serde(default)]
    pub timeouts: AdapterTimeouts,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            queue_interval_secs: defaults::queue_interval_secs(),
            followup_interval_secs: defaults::followup_interval_secs(),
            retry: RetryPolicy::default(),
            business_hours: BusinessHours::default(),
            followups: FollowUpConfig::default(),
            timeouts: AdapterTimeouts::default(),
        }
    }
}

impl LifecycleConfig {
    /// # Errors
    /// If any section is inconsistent, or an interval or timeout is zero.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        if self.queue_interval_secs == 0 || self.followup_interval_secs == 0 {
            return Err(crate::error::SystemError::Configuration(
                "queue_interval_secs and followup_interval_secs must be positive".into(),
            )
            .into());
        }

        self.timeouts
            .validate()
            .map_err(crate::error::SystemError::Configuration)?;
        self.retry.validate()?;
        self.business_hours.validate()?;
        self.followups.validate()
    }
}

/// Drives leads through the email lifecycle.
///
/// All collaborators are handed in already constructed; nothing is created
/// lazily.
#[derive(Debug)]
pub struct LifecycleProcessor {
    config: LifecycleConfig,
    store: Arc<dyn Store>,
    generator: Arc<dyn ContentGenerator>,
    transport: Arc<dyn SendTransport>,
    regions: RegionResolver,

    /// Held for the whole of every pass.
    pass_lock: Mutex<()>,

    /// Leads with a send attempt in progress.
    in_flight: DashSet<LeadId>,
}

impl LifecycleProcessor {
    /// # Errors
    /// If `config` fails validation.
    pub fn new(
        config: LifecycleConfig,
        store: Arc<dyn Store>,
        generator: Arc<dyn ContentGenerator>,
        transport: Arc<dyn SendTransport>,
    ) -> Result<Self, DeliveryError> {
        config.validate()?;
        let regions = RegionResolver::new(&config.business_hours.timezone_overrides)?;

        internal!(
            level = INFO,
            queue_interval_secs = config.queue_interval_secs,
            followup_interval_secs = config.followup_interval_secs,
            max_attempts = config.retry.max_attempts,
            start_hour = config.business_hours.start_hour,
            end_hour = config.business_hours.end_hour,
            "Lifecycle processor initialised"
        );

        Ok(Self {
            config,
            store,
            generator,
            transport,
            regions,
            pass_lock: Mutex::new(()),
            in_flight: DashSet::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Run the periodic driver until a shutdown signal arrives.
    ///
    /// ## Graceful Shutdown
    ///
    /// When a shutdown signal is received during a pass, the pass is given
    /// up to 30 seconds to finish. A pass cut short leaves every lead in a
    /// state the next run picks up again.
    ///
    /// # Errors
    /// Per-pass errors are logged, not returned; this currently always
    /// returns `Ok`.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) -> Result<(), DeliveryError> {
        internal!(level = INFO, "Lifecycle processor starting");

        let mut queue_timer =
            tokio::time::interval(Duration::from_secs(self.config.queue_interval_secs));
        let mut followup_timer =
            tokio::time::interval(Duration::from_secs(self.config.followup_interval_secs));

        queue_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        followup_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first tick to avoid immediate execution
        queue_timer.tick().await;
        followup_timer.tick().await;

        loop {
            let flow = tokio::select! {
                _ = queue_timer.tick() => {
                    drain(self.queue_tick(), &mut shutdown).await
                }
                _ = followup_timer.tick() => {
                    drain(self.followup_tick(), &mut shutdown).await
                }
                sig = shutdown.recv() => {
                    internal!(level = INFO, signal = ?sig, "Lifecycle processor received shutdown signal");
                    ControlFlow::Break(())
                }
            };

            if flow.is_break() {
                break;
            }
        }

        internal!(level = INFO, "Lifecycle processor shutdown complete");
        Ok(())
    }

    async fn queue_tick(&self) {
        match self.trigger_queue_at(Utc::now()).await {
            Ok(report) => internal!(level = INFO, ?report, "Queue pass complete"),
            Err(e) => internal!(level = ERROR, error = %e, "Queue pass failed"),
        }
    }

    async fn followup_tick(&self) {
        match self.process_due_followups_at(Utc::now()).await {
            Ok(report) => internal!(level = INFO, ?report, "Follow-up pass complete"),
            Err(e) => internal!(level = ERROR, error = %e, "Follow-up pass failed"),
        }
    }

    /// Claim `lead_id` for one attempt. `None` if another attempt holds it.
    fn claim(&self, lead_id: LeadId) -> Option<InFlightGuard<'_>> {
        self.in_flight.insert(lead_id).then(|| InFlightGuard {
            in_flight: &self.in_flight,
            lead_id,
        })
    }
}

/// Run `pass`, and if shutdown is requested meanwhile, give it the grace
/// period to finish before stopping.
async fn drain<F>(pass: F, shutdown: &mut broadcast::Receiver<Signal>) -> ControlFlow<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(pass);

    tokio::select! {
        () = &mut pass => ControlFlow::Continue(()),
        sig = shutdown.recv() => {
            internal!(
                level = INFO,
                signal = ?sig,
                "Shutdown requested during a pass, waiting for it to complete"
            );

            if tokio::time::timeout(SHUTDOWN_GRACE, pass).await.is_err() {
                internal!(
                    level = WARN,
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "Shutdown grace period exceeded, abandoning the pass"
                );
            }

            ControlFlow::Break(())
        }
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a DashSet<LeadId>,
    lead_id: LeadId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.lead_id);
    }
}

mod defaults {
    pub const fn queue_interval_secs() -> u64 {
        7200
    }

    pub const fn followup_interval_secs() -> u64 {
        86400
    }
}
