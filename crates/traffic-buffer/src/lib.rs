//! Port Traffic Buffer
//!
//! This crate polls the traffic counters of forwarded local ports and keeps
//! a bounded rolling history per port, ready for live charting.
//!
//! # Architecture
//!
//! A [`TrafficBuffer`] owns one [`KeyRecord`] per monitored key (the latest
//! sample plus its history) and at most one poll task per key. Each task
//! calls an injected [`StatusSource`] once per poll interval:
//!
//! - **Sample**: becomes `current` and is appended to the history; the
//!   oldest entries are evicted past the configured capacity
//! - **No sample**: the tick is skipped
//! - **Error**: logged and reported; the next tick fires as usual
//!
//! Records outlive their poll tasks, so stopping and restarting a key
//! continues the same history.
//!
//! # Event Stream
//!
//! Lifecycle changes and tick outcomes are published as [`BufferEvent`]s on
//! a broadcast channel (see [`TrafficBuffer::subscribe`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use traffic_buffer::{FetchError, LocalPort, StatusSource, TrafficBuffer, TrafficStats};
//!
//! struct MappingApi;
//!
//! impl StatusSource<LocalPort, TrafficStats> for MappingApi {
//!     async fn fetch_status(&self, port: &LocalPort) -> Result<Option<TrafficStats>, FetchError> {
//!         Err(FetchError::NotFound(port.to_string()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let buffer = TrafficBuffer::new(MappingApi);
//!     buffer.start_monitoring(LocalPort(8080)).unwrap();
//!
//!     let mut events = buffer.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod rates;
pub mod source;
pub mod state;

pub use clock::MonotonicClock;
pub use config::{
    BufferConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_HISTORY_CAPACITY, DEFAULT_POLL_INTERVAL_MS,
};
pub use error::{BufferError, FetchError};
pub use events::BufferEvent;
pub use manager::TrafficBuffer;
pub use rates::{average_throughput, peak_throughput, throughput, window, ThroughputPoint};
pub use source::StatusSource;
pub use state::{HistoryEntry, KeyRecord, LocalPort, MonitorKey, TrafficStats};
