//! Buffer configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BufferError;

/// Default poll period (1 Hz)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default history length per key (30 minutes at 1 Hz)
pub const DEFAULT_HISTORY_CAPACITY: usize = 1800;

/// Default event channel depth
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Traffic buffer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Period between fetches for one key (ms)
    pub poll_interval_ms: u64,
    /// Maximum history entries retained per key
    pub history_capacity: usize,
    /// Events buffered per subscriber before the oldest are dropped
    pub event_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl BufferConfig {
    /// Poll period as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the buffer cannot run with
    pub fn validate(&self) -> Result<(), BufferError> {
        if self.poll_interval_ms == 0 {
            return Err(BufferError::InvalidConfig(
                "poll interval must be at least 1ms".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(BufferError::InvalidConfig(
                "history capacity must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(BufferError::InvalidConfig(
                "event capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
