//! Status source seam
//!
//! The buffer does not know how status is fetched. Anything that can
//! answer "what are the counters for this key right now" asynchronously
//! can drive it: an HTTP client against the mapping API, an IPC channel,
//! or the simulated source used in tests.

use std::future::Future;
use std::sync::Arc;

use crate::error::FetchError;

/// Asynchronous provider of traffic samples
///
/// `Ok(None)` means the target exists but is not reporting traffic right
/// now; the tick is skipped without touching the record.
pub trait StatusSource<K, S>: Send + Sync + 'static {
    /// Fetch the current sample for `key`
    fn fetch_status(&self, key: &K) -> impl Future<Output = Result<Option<S>, FetchError>> + Send;
}

impl<K, S, T> StatusSource<K, S> for Arc<T>
where
    T: StatusSource<K, S>,
{
    fn fetch_status(&self, key: &K) -> impl Future<Output = Result<Option<S>, FetchError>> + Send {
        (**self).fetch_status(key)
    }
}
