//! Polling configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::events::DEFAULT_CHANNEL_CAPACITY;

/// Shortest period a timer is allowed to run at
const MIN_INTERVAL_MS: u64 = 1;

/// Polling configuration, supplied once when the coordinator is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between scheduled rounds in milliseconds
    #[serde(rename = "interval-ms", default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Capacity of the event broadcast channel
    #[serde(rename = "event-capacity", default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_interval_ms() -> u64 {
    debug!("default_interval_ms: called");
    10_000
}

fn default_event_capacity() -> usize {
    debug!("default_event_capacity: called");
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for PollingConfig {
    fn default() -> Self {
        debug!("PollingConfig::default: called");
        Self {
            interval_ms: default_interval_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl PollingConfig {
    /// Build a config with the given interval and default everything else
    pub fn with_interval_ms(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            ..Default::default()
        }
    }

    /// Get the polling interval as a Duration
    ///
    /// A zero interval cannot drive a timer and is clamped to 1ms.
    pub fn interval(&self) -> Duration {
        debug!(interval_ms = %self.interval_ms, "PollingConfig::interval: called");
        if self.interval_ms < MIN_INTERVAL_MS {
            warn!(interval_ms = self.interval_ms, "Polling interval below minimum, clamping");
            return Duration::from_millis(MIN_INTERVAL_MS);
        }
        Duration::from_millis(self.interval_ms)
    }
}
