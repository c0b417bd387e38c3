//! Port Traffic Simulation Library
//!
//! This crate provides a simulated status source for exercising the traffic
//! buffer without real forwarding processes. It includes:
//!
//! - **VirtualMapping**: A forwarding process whose counters grow on every
//!   status request, with fault injection
//! - **SimulatedSource**: A [`StatusSource`](traffic_buffer::StatusSource)
//!   over a shared set of virtual mappings
//!
//! # Example
//!
//! ```rust
//! use traffic_buffer::LocalPort;
//! use traffic_sim::{SimulatedSource, TrafficProfile};
//!
//! let source = SimulatedSource::new();
//! source.add_port(LocalPort(8080), TrafficProfile::default());
//!
//! // Fail the next two status requests
//! source.fail_next(LocalPort(8080), 2);
//! assert_eq!(source.ports(), vec![LocalPort(8080)]);
//! ```

pub mod mapping;
pub mod source;

pub use mapping::{TrafficProfile, VirtualMapping};
pub use source::SimulatedSource;
