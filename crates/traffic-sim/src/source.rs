//! Simulated status source
//!
//! Implements [`StatusSource`] over a set of [`VirtualMapping`]s, so the
//! buffer can be driven exactly as it would be against the mapping API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;
use traffic_buffer::{FetchError, LocalPort, StatusSource, TrafficStats};

use crate::mapping::{TrafficProfile, VirtualMapping};

/// Shared set of virtual mappings
///
/// Clones share the same mappings, so a test can keep one handle for fault
/// injection while the buffer owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSource {
    mappings: Arc<Mutex<HashMap<LocalPort, VirtualMapping>>>,
}

impl SimulatedSource {
    /// Create a source with no mappings
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<LocalPort, VirtualMapping>> {
        self.mappings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the mapping for `port`, returning `None` if it does not exist
    pub fn with_mapping<R>(
        &self,
        port: LocalPort,
        f: impl FnOnce(&mut VirtualMapping) -> R,
    ) -> Option<R> {
        self.lock().get_mut(&port).map(f)
    }

    /// Add (or replace) a mapping
    pub fn add_port(&self, port: LocalPort, profile: TrafficProfile) {
        info!("Adding virtual mapping on {}", port);
        self.lock().insert(port, VirtualMapping::new(port, profile));
    }

    /// Remove a mapping; later fetches for it fail with `NotFound`
    pub fn remove_port(&self, port: LocalPort) -> bool {
        let removed = self.lock().remove(&port).is_some();
        if removed {
            info!("Removed virtual mapping on {}", port);
        }
        removed
    }

    /// Make the next `count` fetches for `port` fail
    pub fn fail_next(&self, port: LocalPort, count: u32) -> bool {
        self.with_mapping(port, |m| m.fail_next(count)).is_some()
    }

    /// Start or stop the forwarding process behind `port`
    pub fn set_running(&self, port: LocalPort, running: bool) -> bool {
        self.with_mapping(port, |m| m.set_running(running)).is_some()
    }

    /// Restart the forwarding process behind `port`, zeroing its counters
    pub fn restart(&self, port: LocalPort) -> bool {
        self.with_mapping(port, VirtualMapping::restart).is_some()
    }

    /// Status requests seen for `port`
    pub fn fetch_count(&self, port: LocalPort) -> u64 {
        self.with_mapping(port, |m| m.fetch_count()).unwrap_or(0)
    }

    /// Ports with a mapping, in ascending order
    pub fn ports(&self) -> Vec<LocalPort> {
        let mut ports: Vec<LocalPort> = self.lock().keys().copied().collect();
        ports.sort();
        ports
    }

    fn next_sample(&self, port: LocalPort) -> Result<Option<TrafficStats>, FetchError> {
        self.with_mapping(port, VirtualMapping::fetch)
            .unwrap_or_else(|| Err(FetchError::NotFound(port.to_string())))
    }
}

impl StatusSource<LocalPort, TrafficStats> for SimulatedSource {
    async fn fetch_status(&self, key: &LocalPort) -> Result<Option<TrafficStats>, FetchError> {
        self.next_sample(*key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use traffic_buffer::{throughput, BufferEvent, TrafficBuffer};

    const PERIOD: Duration = Duration::from_millis(1000);

    fn profile() -> TrafficProfile {
        TrafficProfile {
            sent_per_fetch: 100,
            recv_per_fetch: 500,
            connections: 1,
        }
    }

    #[tokio::test]
    async fn test_unknown_port_not_found() {
        let source = SimulatedSource::new();
        let result = source.fetch_status(&LocalPort(1)).await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clones_share_mappings() {
        let source = SimulatedSource::new();
        let handle = source.clone();
        handle.add_port(LocalPort(8080), profile());

        source.fetch_status(&LocalPort(8080)).await.unwrap();

        assert_eq!(handle.fetch_count(LocalPort(8080)), 1);
        assert_eq!(handle.ports(), vec![LocalPort(8080)]);
        assert!(handle.remove_port(LocalPort(8080)));
        assert!(!handle.remove_port(LocalPort(8080)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drives_buffer() {
        let source = SimulatedSource::new();
        source.add_port(LocalPort(8080), profile());
        source.add_port(LocalPort(9090), profile());
        let buffer = TrafficBuffer::new(source.clone());

        buffer.start_monitoring(LocalPort(8080)).unwrap();
        buffer.start_monitoring(LocalPort(9090)).unwrap();
        tokio::time::sleep(PERIOD / 2).await;
        tokio::time::sleep(PERIOD * 2).await;

        source.fail_next(LocalPort(9090), 1);
        tokio::time::sleep(PERIOD).await;
        source.set_running(LocalPort(8080), false);
        tokio::time::sleep(PERIOD).await;

        // 8080: 3 samples then one stopped tick
        assert_eq!(buffer.history_len(&LocalPort(8080)), 3);
        assert_eq!(
            buffer.current(&LocalPort(8080)),
            Some(TrafficStats::new(300, 1500, 1))
        );

        // 9090: 2 samples, a failure, then a fourth fetch
        assert_eq!(buffer.history_len(&LocalPort(9090)), 3);
        assert_eq!(source.fetch_count(LocalPort(9090)), 4);

        let points = buffer.with_record(&LocalPort(9090), |r| throughput(r.history())).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].sent_bytes_per_sec, 100.0);
        // The failed tick widens the second interval to two periods
        assert_eq!(points[1].recv_bytes_per_sec, 250.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_port_reports_failures() {
        let source = SimulatedSource::new();
        source.add_port(LocalPort(8080), profile());
        let buffer = TrafficBuffer::new(source.clone());
        let mut events = buffer.subscribe();

        buffer.start_monitoring(LocalPort(8080)).unwrap();
        tokio::time::sleep(PERIOD / 2).await;
        tokio::time::sleep(PERIOD).await;
        source.remove_port(LocalPort(8080));
        tokio::time::sleep(PERIOD).await;

        assert!(buffer.is_monitoring(&LocalPort(8080)));
        assert_eq!(buffer.history_len(&LocalPort(8080)), 1);

        let failed = std::iter::from_fn(|| events.try_recv().ok())
            .filter(BufferEvent::is_error)
            .count();
        assert_eq!(failed, 1);
    }
}
