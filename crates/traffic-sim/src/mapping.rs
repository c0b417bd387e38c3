//! Virtual port mapping
//!
//! A simulated forwarding process whose counters grow on every status
//! request. Used to exercise the buffer without spawning real forwarders.

use serde::{Deserialize, Serialize};
use tracing::debug;
use traffic_buffer::{FetchError, LocalPort, TrafficStats};

/// How much traffic a virtual mapping moves per status request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficProfile {
    /// Bytes added to `bytes_sent` per fetch
    pub sent_per_fetch: u64,
    /// Bytes added to `bytes_recv` per fetch
    pub recv_per_fetch: u64,
    /// Reported open connections
    pub connections: u32,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self {
            sent_per_fetch: 1024,
            recv_per_fetch: 4096,
            connections: 2,
        }
    }
}

/// Simulated forwarding process for one local port
#[derive(Debug, Clone)]
pub struct VirtualMapping {
    local_port: LocalPort,
    profile: TrafficProfile,
    stats: TrafficStats,
    running: bool,
    /// Fetches still to fail
    fail_remaining: u32,
    /// Status requests seen (for test verification)
    fetches: u64,
}

impl VirtualMapping {
    /// Create a running mapping with zeroed counters
    pub fn new(local_port: LocalPort, profile: TrafficProfile) -> Self {
        Self {
            local_port,
            profile,
            stats: TrafficStats::default(),
            running: true,
            fail_remaining: 0,
            fetches: 0,
        }
    }

    /// Get the local port
    pub fn local_port(&self) -> LocalPort {
        self.local_port
    }

    /// Get the traffic profile
    pub fn profile(&self) -> TrafficProfile {
        self.profile
    }

    /// Replace the traffic profile
    pub fn set_profile(&mut self, profile: TrafficProfile) {
        self.profile = profile;
    }

    /// Counters as of the last successful fetch
    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    /// Number of status requests seen
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    /// Whether the forwarding process is up
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start or stop the forwarding process
    ///
    /// A stopped mapping still answers status requests but reports no
    /// traffic.
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Make the next `count` status requests fail
    pub fn fail_next(&mut self, count: u32) {
        self.fail_remaining = count;
    }

    /// Restart the forwarding process, zeroing its counters
    pub fn restart(&mut self) {
        self.stats = TrafficStats::default();
        self.running = true;
    }

    /// Answer one status request
    pub fn fetch(&mut self) -> Result<Option<TrafficStats>, FetchError> {
        self.fetches += 1;

        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            return Err(FetchError::Unavailable(format!(
                "status endpoint for {} not responding",
                self.local_port
            )));
        }

        if !self.running {
            debug!("Virtual mapping {} is stopped, no traffic", self.local_port);
            return Ok(None);
        }

        self.stats.bytes_sent = self.stats.bytes_sent.saturating_add(self.profile.sent_per_fetch);
        self.stats.bytes_recv = self.stats.bytes_recv.saturating_add(self.profile.recv_per_fetch);
        self.stats.connections = self.profile.connections;
        Ok(Some(self.stats.clone()))
    }
}
