//! Error types for the traffic buffer

use thiserror::Error;

/// Errors a status source can return for a single fetch
///
/// Fetch errors never escape a poll task: they are logged, reported as
/// [`BufferEvent::FetchFailed`](crate::BufferEvent::FetchFailed), and the
/// schedule keeps running.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The status endpoint could not be reached or refused the request
    #[error("status source unavailable: {0}")]
    Unavailable(String),

    /// No mapping exists for the requested key
    #[error("mapping not found: {0}")]
    NotFound(String),

    /// The request did not complete in time
    #[error("status request timed out")]
    Timeout,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other source-specific failure
    #[error("{0}")]
    Other(String),
}

/// Errors returned by the buffer manager itself
#[derive(Debug, Error)]
pub enum BufferError {
    /// `start_monitoring` was called outside a tokio runtime
    #[error("no tokio runtime available to schedule polling")]
    NoRuntime,

    /// Configuration rejected at construction
    #[error("invalid buffer configuration: {0}")]
    InvalidConfig(String),
}
