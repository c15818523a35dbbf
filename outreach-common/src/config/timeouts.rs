//! Timeouts for calls into external collaborators.
//!
//! Every call the engine makes to the outside world is bounded. A call that
//! exceeds its timeout is reported as a temporary failure and goes through the
//! normal retry path, exactly like any other transport or generation error.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterTimeouts {
    /// Upper bound for one content generation call.
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::generate_secs")]
    pub generate_secs: u64,

    /// Upper bound for one send call.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::send_secs")]
    pub send_secs: u64,
}

impl Default for AdapterTimeouts {
    fn default() -> Self {
        Self {
            generate_secs: defaults::generate_secs(),
            send_secs: defaults::send_secs(),
        }
    }
}

impl AdapterTimeouts {
    /// # Errors
    /// If either timeout is zero; every call would time out immediately.
    pub fn validate(&self) -> Result<(), String> {
        if self.generate_secs == 0 || self.send_secs == 0 {
            return Err(format!(
                "timeouts must be positive, got generate_secs: {} and send_secs: {}",
                self.generate_secs, self.send_secs
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_secs)
    }

    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_secs)
    }
}

mod defaults {
    pub const fn generate_secs() -> u64 {
        60
    }

    pub const fn send_secs() -> u64 {
        30
    }
}
