//! Event stream for buffer observers
//!
//! Every lifecycle change and every tick outcome is published on one
//! broadcast channel, so a chart or log view can follow the buffer
//! without polling it.

/// Buffer activity for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent<K> {
    /// A poll task was scheduled for the key
    MonitoringStarted {
        /// Monitored key
        key: K,
    },

    /// The key's poll task was cancelled
    MonitoringStopped {
        /// Monitored key
        key: K,
    },

    /// A sample was appended to the key's history
    SampleRecorded {
        /// Monitored key
        key: K,
        /// History length after the append
        history_len: usize,
        /// Entries evicted to stay within capacity
        evicted: usize,
    },

    /// The source answered but had no sample
    SampleMissing {
        /// Monitored key
        key: K,
    },

    /// The source failed for this tick
    FetchFailed {
        /// Monitored key
        key: K,
        /// Error message
        message: String,
    },
}

impl<K> BufferEvent<K> {
    /// Key the event belongs to
    pub fn key(&self) -> &K {
        match self {
            BufferEvent::MonitoringStarted { key }
            | BufferEvent::MonitoringStopped { key }
            | BufferEvent::SampleRecorded { key, .. }
            | BufferEvent::SampleMissing { key }
            | BufferEvent::FetchFailed { key, .. } => key,
        }
    }

    /// Check if this event reports a failed fetch
    pub fn is_error(&self) -> bool {
        matches!(self, BufferEvent::FetchFailed { .. })
    }

    /// Check if this is a start/stop event
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            BufferEvent::MonitoringStarted { .. } | BufferEvent::MonitoringStopped { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        let failed = BufferEvent::FetchFailed {
            key: 8080u16,
            message: "refused".to_string(),
        };
        assert!(failed.is_error());
        assert!(!failed.is_lifecycle());
        assert_eq!(*failed.key(), 8080);

        let started = BufferEvent::MonitoringStarted { key: 22u16 };
        assert!(started.is_lifecycle());
        assert!(!started.is_error());

        let recorded = BufferEvent::SampleRecorded {
            key: 443u16,
            history_len: 3,
            evicted: 0,
        };
        assert_eq!(*recorded.key(), 443);
        assert!(!recorded.is_lifecycle());
    }
}
