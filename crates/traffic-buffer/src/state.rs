//! Per-key buffer state

use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Identifier of a polling target
///
/// Blanket-implemented for every type that can be used as a map key and
/// moved into a poll task.
pub trait MonitorKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> MonitorKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Local port number of a forwarded mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalPort(pub u16);

impl LocalPort {
    /// Get the raw port number
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for LocalPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl From<u16> for LocalPort {
    fn from(port: u16) -> Self {
        Self(port)
    }
}

/// Traffic counters reported by a mapping's status endpoint
///
/// Byte counters are cumulative since the forwarding process started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStats {
    /// Open connections through the mapping
    pub connections: u32,
    /// Bytes written by the forwarding process
    pub bytes_sent: u64,
    /// Bytes read by the forwarding process
    pub bytes_recv: u64,
    /// Time the status endpoint computed these counters (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl TrafficStats {
    /// Create a sample without an update time
    pub fn new(bytes_sent: u64, bytes_recv: u64, connections: u32) -> Self {
        Self {
            connections,
            bytes_sent,
            bytes_recv,
            update_time: None,
        }
    }

    /// Bytes moved in both directions
    pub fn total_bytes(&self) -> u64 {
        self.bytes_sent.saturating_add(self.bytes_recv)
    }
}

/// A sample tagged with the time it was captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry<S> {
    /// The captured sample
    pub sample: S,
    /// Wall-clock time of the successful fetch
    pub captured_at: SystemTime,
}

/// Latest sample and rolling history for one key
#[derive(Debug, Clone)]
pub struct KeyRecord<S> {
    current: Option<S>,
    history: VecDeque<HistoryEntry<S>>,
}

impl<S> Default for KeyRecord<S> {
    fn default() -> Self {
        Self {
            current: None,
            history: VecDeque::new(),
        }
    }
}

impl<S: Clone> KeyRecord<S> {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent successfully fetched sample
    pub fn current(&self) -> Option<&S> {
        self.current.as_ref()
    }

    /// History, oldest first
    pub fn history(&self) -> &VecDeque<HistoryEntry<S>> {
        &self.history
    }

    /// Newest history entry
    pub fn latest(&self) -> Option<&HistoryEntry<S>> {
        self.history.back()
    }

    /// Number of retained history entries
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether no history is retained
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Record a successful sample
    ///
    /// This is the only insertion path. The history never holds more than
    /// `capacity` entries when this returns; the oldest entries go first.
    /// Returns how many entries were evicted.
    pub fn push(&mut self, sample: S, captured_at: SystemTime, capacity: usize) -> usize {
        self.current = Some(sample.clone());
        self.history.push_back(HistoryEntry {
            sample,
            captured_at,
        });

        let mut evicted = 0;
        while self.history.len() > capacity {
            self.history.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Drop the current sample and all history
    pub fn clear(&mut self) {
        self.current = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_push_sets_current_and_appends() {
        let mut record = KeyRecord::new();
        assert!(record.current().is_none());
        assert!(record.is_empty());

        let evicted = record.push(TrafficStats::new(50, 100, 1), at(1), 10);

        assert_eq!(evicted, 0);
        assert_eq!(record.current(), Some(&TrafficStats::new(50, 100, 1)));
        assert_eq!(record.len(), 1);
        assert_eq!(record.latest().map(|e| e.captured_at), Some(at(1)));
    }

    #[test]
    fn test_push_evicts_oldest_first() {
        let mut record = KeyRecord::new();
        for i in 1..=3 {
            assert_eq!(record.push(i, at(i), 3), 0);
        }

        assert_eq!(record.push(4, at(4), 3), 1);

        let samples: Vec<u64> = record.history().iter().map(|e| e.sample).collect();
        assert_eq!(samples, vec![2, 3, 4]);
        assert_eq!(record.current(), Some(&4));
    }

    #[test]
    fn test_push_trims_after_capacity_shrinks() {
        let mut record = KeyRecord::new();
        for i in 1..=5 {
            record.push(i, at(i), 10);
        }

        assert_eq!(record.push(6, at(6), 2), 4);
        let samples: Vec<u64> = record.history().iter().map(|e| e.sample).collect();
        assert_eq!(samples, vec![5, 6]);
    }

    #[test]
    fn test_clear() {
        let mut record = KeyRecord::new();
        record.push(1u8, at(1), 5);
        record.clear();

        assert!(record.current().is_none());
        assert!(record.is_empty());
    }

    #[test]
    fn test_traffic_stats_serde_shape() {
        let json = r#"{"connections":3,"bytes_sent":10,"bytes_recv":20,"update_time":"2024-01-01T00:00:00"}"#;
        let stats: TrafficStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.connections, 3);
        assert_eq!(stats.total_bytes(), 30);
        assert_eq!(stats.update_time.as_deref(), Some("2024-01-01T00:00:00"));

        // update_time is optional on the wire
        let stats: TrafficStats =
            serde_json::from_str(r#"{"connections":0,"bytes_sent":1,"bytes_recv":2}"#).unwrap();
        assert!(stats.update_time.is_none());
        assert!(!serde_json::to_string(&stats).unwrap().contains("update_time"));
    }

    #[test]
    fn test_local_port_display() {
        assert_eq!(LocalPort(8080).to_string(), ":8080");
        assert_eq!(LocalPort::from(22).as_u16(), 22);
    }
}
