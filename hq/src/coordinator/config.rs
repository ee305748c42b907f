//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Channel buffer size for coordinator commands
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// How often to look for changes made by other processes (0 disables)
    #[serde(rename = "store-poll-interval-ms", default = "default_store_poll_interval_ms")]
    pub store_poll_interval_ms: u64,

    /// Delay before retrying after a connectivity-class failure (0 disables backoff)
    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling retry delay
    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_channel_buffer() -> usize {
    256
}

fn default_store_poll_interval_ms() -> u64 {
    2_000
}

fn default_initial_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    300_000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            channel_buffer: default_channel_buffer(),
            store_poll_interval_ms: default_store_poll_interval_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl CoordinatorConfig {
    /// Polling interval for out-of-process store changes, if enabled
    pub fn store_poll_interval(&self) -> Option<Duration> {
        (self.store_poll_interval_ms > 0).then(|| Duration::from_millis(self.store_poll_interval_ms))
    }

    /// Delay before the next attempt after `consecutive` transient failures
    ///
    /// None means backoff is disabled: the queue waits for the next
    /// connectivity change, enqueue, or endpoint update instead.
    pub fn transient_backoff(&self, consecutive: u32) -> Option<Duration> {
        if self.initial_backoff_ms == 0 {
            return None;
        }

        let exponent = consecutive.saturating_sub(1).min(32);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms.max(self.initial_backoff_ms));
        Some(Duration::from_millis(delay))
    }
}
