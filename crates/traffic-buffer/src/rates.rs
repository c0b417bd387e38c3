//! Throughput derived from cumulative counters
//!
//! Status endpoints report running byte totals. Charts want bytes per
//! second, so these helpers turn consecutive history entries into rate
//! points.

use std::time::SystemTime;

use serde::Serialize;

use crate::state::{HistoryEntry, TrafficStats};

/// Transfer rate over one interval between two history entries
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputPoint {
    /// Capture time of the later entry
    pub at: SystemTime,
    /// Outbound rate (bytes/s)
    pub sent_bytes_per_sec: f64,
    /// Inbound rate (bytes/s)
    pub recv_bytes_per_sec: f64,
    /// Connections open at the later entry
    pub connections: u32,
}

/// Rate points for every consecutive pair of entries
///
/// A counter that went down (the forwarding process restarted) yields a
/// zero rate for that interval. Pairs with no elapsed time are skipped.
pub fn throughput<'a, I>(history: I) -> Vec<ThroughputPoint>
where
    I: IntoIterator<Item = &'a HistoryEntry<TrafficStats>>,
{
    let mut points = Vec::new();
    let mut previous: Option<&HistoryEntry<TrafficStats>> = None;

    for entry in history {
        if let Some(prev) = previous {
            let elapsed = entry
                .captured_at
                .duration_since(prev.captured_at)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);

            if elapsed > 0.0 {
                let sent = entry.sample.bytes_sent.saturating_sub(prev.sample.bytes_sent);
                let recv = entry.sample.bytes_recv.saturating_sub(prev.sample.bytes_recv);
                points.push(ThroughputPoint {
                    at: entry.captured_at,
                    sent_bytes_per_sec: sent as f64 / elapsed,
                    recv_bytes_per_sec: recv as f64 / elapsed,
                    connections: entry.sample.connections,
                });
            }
        }
        previous = Some(entry);
    }

    points
}

/// Highest (sent, received) rates in `points`
pub fn peak_throughput(points: &[ThroughputPoint]) -> (f64, f64) {
    points.iter().fold((0.0, 0.0), |(sent, recv), p| {
        (sent.max(p.sent_bytes_per_sec), recv.max(p.recv_bytes_per_sec))
    })
}

/// Mean (sent, received) rates in `points`
pub fn average_throughput(points: &[ThroughputPoint]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let (sent, recv) = points.iter().fold((0.0, 0.0), |(sent, recv), p| {
        (sent + p.sent_bytes_per_sec, recv + p.recv_bytes_per_sec)
    });
    let n = points.len() as f64;
    (sent / n, recv / n)
}

/// Entries captured at or after `since`
///
/// History is ordered by capture time, so this stops scanning at the first
/// entry inside the window.
pub fn window<'a, S, I>(history: I, since: SystemTime) -> Vec<&'a HistoryEntry<S>>
where
    S: 'a,
    I: IntoIterator<Item = &'a HistoryEntry<S>>,
{
    history
        .into_iter()
        .skip_while(|entry| entry.captured_at < since)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(secs: u64, sent: u64, recv: u64, connections: u32) -> HistoryEntry<TrafficStats> {
        HistoryEntry {
            sample: TrafficStats::new(sent, recv, connections),
            captured_at: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_rates_from_counter_deltas() {
        let history = vec![
            entry(10, 0, 0, 1),
            entry(11, 1000, 4000, 2),
            entry(13, 3000, 8000, 3),
        ];

        let points = throughput(&history);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].sent_bytes_per_sec, 1000.0);
        assert_eq!(points[0].recv_bytes_per_sec, 4000.0);
        assert_eq!(points[0].connections, 2);
        assert_eq!(points[1].sent_bytes_per_sec, 1000.0);
        assert_eq!(points[1].recv_bytes_per_sec, 2000.0);
        assert_eq!(points[1].at, history[2].captured_at);
    }

    #[test]
    fn test_counter_reset_clamps_to_zero() {
        let history = vec![entry(1, 5000, 5000, 1), entry(2, 100, 200, 1)];

        let points = throughput(&history);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].sent_bytes_per_sec, 0.0);
        assert_eq!(points[0].recv_bytes_per_sec, 0.0);
    }

    #[test]
    fn test_zero_interval_skipped() {
        let history = vec![entry(1, 0, 0, 1), entry(1, 100, 100, 1), entry(2, 200, 300, 1)];

        let points = throughput(&history);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].sent_bytes_per_sec, 100.0);
        assert_eq!(points[0].recv_bytes_per_sec, 200.0);
    }

    #[test]
    fn test_short_history_has_no_points() {
        assert!(throughput(&Vec::new()).is_empty());
        assert!(throughput(&vec![entry(1, 1, 1, 1)]).is_empty());
    }

    #[test]
    fn test_peak_and_average() {
        let history = vec![
            entry(0, 0, 0, 1),
            entry(1, 100, 300, 1),
            entry(2, 400, 400, 1),
        ];
        let points = throughput(&history);

        assert_eq!(peak_throughput(&points), (300.0, 300.0));
        assert_eq!(average_throughput(&points), (200.0, 200.0));
        assert_eq!(peak_throughput(&[]), (0.0, 0.0));
        assert_eq!(average_throughput(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_window() {
        let history = vec![entry(1, 0, 0, 1), entry(5, 0, 0, 1), entry(9, 0, 0, 1)];
        let since = SystemTime::UNIX_EPOCH + Duration::from_secs(5);

        let recent = window(&history, since);

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].captured_at, since);
    }
}
