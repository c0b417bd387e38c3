//! Traffic buffer manager
//!
//! Owns the per-key records and one poll task per monitored key. Each poll
//! task is a spawned tokio task that waits on an interval, awaits the
//! status source, and applies the result under the shared state lock.
//!
//! # Scheduling
//!
//! A task awaits its fetch before waiting for the next tick, so two fetches
//! for the same key never run at once. Ticks that come due while a fetch
//! is still outstanding are skipped (`MissedTickBehavior::Skip`), and
//! history order is the order fetches completed in.
//!
//! # Cancellation
//!
//! `stop_monitoring` removes the task from the table and aborts it before
//! returning. Every task carries the session id it was started with; a
//! result that completes after its session ended is discarded rather than
//! applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::MonotonicClock;
use crate::config::BufferConfig;
use crate::error::{BufferError, FetchError};
use crate::events::BufferEvent;
use crate::source::StatusSource;
use crate::state::{HistoryEntry, KeyRecord, MonitorKey};

/// A running poll task
struct PollTask {
    /// Session this task applies results for
    session: u64,
    handle: JoinHandle<()>,
}

/// State shared between the manager and its poll tasks
struct BufferState<K, S> {
    /// Records for every key ever started
    records: HashMap<K, KeyRecord<S>>,
    /// Active poll tasks (at most one per key)
    tasks: HashMap<K, PollTask>,
    /// Next session id to hand out
    next_session: u64,
}

impl<K: MonitorKey, S> BufferState<K, S> {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            tasks: HashMap::new(),
            next_session: 1,
        }
    }

    fn is_active_session(&self, key: &K, session: u64) -> bool {
        self.tasks
            .get(key)
            .is_some_and(|task| task.session == session)
    }
}

type SharedState<K, S> = Arc<Mutex<BufferState<K, S>>>;

fn lock_state<K, S>(shared: &Mutex<BufferState<K, S>>) -> MutexGuard<'_, BufferState<K, S>> {
    // Every mutation is a single short critical section, so the state is
    // consistent even if a holder panicked.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-key traffic sampler with bounded rolling history
///
/// # Example
///
/// ```rust,no_run
/// use traffic_buffer::{FetchError, LocalPort, StatusSource, TrafficBuffer, TrafficStats};
///
/// struct Endpoint;
///
/// impl StatusSource<LocalPort, TrafficStats> for Endpoint {
///     async fn fetch_status(&self, _port: &LocalPort) -> Result<Option<TrafficStats>, FetchError> {
///         Ok(Some(TrafficStats::new(50, 100, 1)))
///     }
/// }
///
/// # async fn run() -> Result<(), traffic_buffer::BufferError> {
/// let buffer = TrafficBuffer::new(Endpoint);
/// buffer.start_monitoring(LocalPort(8080))?;
/// // ... later, from the charting side:
/// let points = buffer.history(&LocalPort(8080));
/// buffer.stop_monitoring(&LocalPort(8080));
/// # Ok(())
/// # }
/// ```
pub struct TrafficBuffer<K, S, F> {
    config: BufferConfig,
    source: Arc<F>,
    shared: SharedState<K, S>,
    event_tx: broadcast::Sender<BufferEvent<K>>,
    clock: MonotonicClock,
}

impl<K, S, F> TrafficBuffer<K, S, F>
where
    K: MonitorKey,
    S: Clone + Send + Sync + 'static,
    F: StatusSource<K, S>,
{
    /// Create a buffer with the default configuration
    pub fn new(source: F) -> Self {
        Self::build(source, BufferConfig::default())
    }

    /// Create a buffer with a custom configuration
    pub fn with_config(source: F, config: BufferConfig) -> Result<Self, BufferError> {
        config.validate()?;
        Ok(Self::build(source, config))
    }

    fn build(source: F, config: BufferConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Self {
            config,
            source: Arc::new(source),
            shared: Arc::new(Mutex::new(BufferState::new())),
            event_tx,
            clock: MonotonicClock::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState<K, S>> {
        lock_state(&self.shared)
    }

    fn emit(&self, event: BufferEvent<K>) {
        // No subscribers is not an error
        let _ = self.event_tx.send(event);
    }

    /// Start polling `key`
    ///
    /// Creates the key's record if it does not exist yet. Calling this for
    /// a key that is already being polled does nothing. The first fetch
    /// happens one poll interval after this call.
    pub fn start_monitoring(&self, key: K) -> Result<(), BufferError> {
        let runtime = Handle::try_current().map_err(|_| BufferError::NoRuntime)?;

        let mut state = self.lock();
        state.records.entry(key.clone()).or_default();

        if let Some(task) = state.tasks.get(&key) {
            if !task.handle.is_finished() {
                debug!("Already monitoring {:?}, ignoring start", key);
                return Ok(());
            }
            // The task died (source panicked); replace it below
            warn!("Poll task for {:?} exited unexpectedly, restarting", key);
        }

        let session = state.next_session;
        state.next_session += 1;

        let handle = runtime.spawn(run_poll_task(PollContext {
            key: key.clone(),
            session,
            period: self.config.poll_interval(),
            capacity: self.config.history_capacity,
            source: Arc::clone(&self.source),
            shared: Arc::clone(&self.shared),
            event_tx: self.event_tx.clone(),
            clock: self.clock,
        }));
        state.tasks.insert(key.clone(), PollTask { session, handle });
        drop(state);

        info!(
            "Started monitoring {:?} every {}ms (session {})",
            key, self.config.poll_interval_ms, session
        );
        self.emit(BufferEvent::MonitoringStarted { key });
        Ok(())
    }

    /// Stop polling `key`
    ///
    /// No tick fires for the key after this returns. The record and its
    /// history are kept; a later `start_monitoring` appends to them.
    /// Stopping a key that is not being polled does nothing.
    pub fn stop_monitoring(&self, key: &K) {
        let task = self.lock().tasks.remove(key);
        match task {
            Some(task) => {
                task.handle.abort();
                info!(
                    "Stopped monitoring {:?} (session {})",
                    key, task.session
                );
                self.emit(BufferEvent::MonitoringStopped { key: key.clone() });
            }
            None => debug!("Not monitoring {:?}, ignoring stop", key),
        }
    }

    /// Stop polling every key
    pub fn stop_all(&self) {
        let tasks: Vec<(K, PollTask)> = self.lock().tasks.drain().collect();
        if tasks.is_empty() {
            return;
        }

        info!("Stopping {} poll task(s)", tasks.len());
        for (key, task) in tasks {
            task.handle.abort();
            self.emit(BufferEvent::MonitoringStopped { key });
        }
    }

    /// Stop polling `key` and drop its record
    ///
    /// Returns whether a record existed.
    pub fn forget(&self, key: &K) -> bool {
        self.stop_monitoring(key);
        let removed = self.lock().records.remove(key).is_some();
        if removed {
            debug!("Dropped record for {:?}", key);
        }
        removed
    }

    /// Clear the current sample and history of `key`, keeping the record
    ///
    /// Returns whether a record existed.
    pub fn clear_history(&self, key: &K) -> bool {
        match self.lock().records.get_mut(key) {
            Some(record) => {
                record.clear();
                true
            }
            None => false,
        }
    }

    /// Whether a poll task is active for `key`
    pub fn is_monitoring(&self, key: &K) -> bool {
        self.lock()
            .tasks
            .get(key)
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Keys with an active poll task
    pub fn monitored_keys(&self) -> Vec<K> {
        self.lock()
            .tasks
            .iter()
            .filter(|(_, task)| !task.handle.is_finished())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Keys with a record, monitored or not
    pub fn keys(&self) -> Vec<K> {
        self.lock().records.keys().cloned().collect()
    }

    /// Most recent successful sample for `key`
    pub fn current(&self, key: &K) -> Option<S> {
        self.lock()
            .records
            .get(key)
            .and_then(|record| record.current().cloned())
    }

    /// History of `key`, oldest first (empty if the key is unknown)
    pub fn history(&self, key: &K) -> Vec<HistoryEntry<S>> {
        self.lock()
            .records
            .get(key)
            .map(|record| record.history().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Newest history entry for `key`
    pub fn latest(&self, key: &K) -> Option<HistoryEntry<S>> {
        self.lock()
            .records
            .get(key)
            .and_then(|record| record.latest().cloned())
    }

    /// Number of history entries retained for `key`
    pub fn history_len(&self, key: &K) -> usize {
        self.lock().records.get(key).map_or(0, KeyRecord::len)
    }

    /// Snapshot of the full record for `key`
    pub fn record(&self, key: &K) -> Option<KeyRecord<S>> {
        self.lock().records.get(key).cloned()
    }

    /// Run `f` against the record for `key` without copying it
    ///
    /// Holds the state lock for the duration of `f`; poll tasks for every
    /// key wait until it returns.
    pub fn with_record<R>(&self, key: &K, f: impl FnOnce(&KeyRecord<S>) -> R) -> Option<R> {
        self.lock().records.get(key).map(f)
    }

    /// Subscribe to buffer events
    pub fn subscribe(&self) -> broadcast::Receiver<BufferEvent<K>> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// The status source driving this buffer
    pub fn source(&self) -> &Arc<F> {
        &self.source
    }
}

impl<K, S, F> Drop for TrafficBuffer<K, S, F> {
    fn drop(&mut self) {
        let mut state = lock_state(&self.shared);
        for (_, task) in state.tasks.drain() {
            task.handle.abort();
        }
    }
}

/// Everything a poll task needs, moved into the spawned future
struct PollContext<K, S, F> {
    key: K,
    session: u64,
    period: Duration,
    capacity: usize,
    source: Arc<F>,
    shared: SharedState<K, S>,
    event_tx: broadcast::Sender<BufferEvent<K>>,
    clock: MonotonicClock,
}

/// Poll one key until the session ends or the task is aborted
async fn run_poll_task<K, S, F>(ctx: PollContext<K, S, F>)
where
    K: MonitorKey,
    S: Clone + Send + Sync + 'static,
    F: StatusSource<K, S>,
{
    let mut ticker = interval_at(Instant::now() + ctx.period, ctx.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let result = ctx.source.fetch_status(&ctx.key).await;
        let captured_at = ctx.clock.now();

        match apply_fetch(
            &ctx.shared,
            &ctx.key,
            ctx.session,
            result,
            captured_at,
            ctx.capacity,
        ) {
            Some(event) => {
                let _ = ctx.event_tx.send(event);
            }
            None => break,
        }
    }

    debug!(
        "Poll task for {:?} (session {}) ended",
        ctx.key, ctx.session
    );
}

/// Apply one fetch result to the key's record
///
/// Returns the event describing the outcome, or `None` if the session is
/// no longer active and the result was discarded.
fn apply_fetch<K, S>(
    shared: &Mutex<BufferState<K, S>>,
    key: &K,
    session: u64,
    result: Result<Option<S>, FetchError>,
    captured_at: SystemTime,
    capacity: usize,
) -> Option<BufferEvent<K>>
where
    K: MonitorKey,
    S: Clone,
{
    let mut state = lock_state(shared);
    if !state.is_active_session(key, session) {
        debug!(
            "Discarding result for {:?}: session {} is no longer active",
            key, session
        );
        return None;
    }

    let event = match result {
        Ok(Some(sample)) => {
            let record = state.records.entry(key.clone()).or_default();
            let evicted = record.push(sample, captured_at, capacity);
            let history_len = record.len();
            debug!(
                "Recorded sample for {:?} ({} in history, {} evicted)",
                key, history_len, evicted
            );
            BufferEvent::SampleRecorded {
                key: key.clone(),
                history_len,
                evicted,
            }
        }
        Ok(None) => {
            debug!("No traffic reported for {:?}", key);
            BufferEvent::SampleMissing { key: key.clone() }
        }
        Err(e) => {
            warn!("Failed to fetch traffic for {:?}: {}", key, e);
            BufferEvent::FetchFailed {
                key: key.clone(),
                message: e.to_string(),
            }
        }
    };
    Some(event)
}
