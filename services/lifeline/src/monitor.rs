//! Connectivity monitor: the single process-wide belief about backend health

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ConnectivityConfig;
use crate::probe::{Probe, ProbeResult};

/// Consecutive failed probes after which a warning is logged
const FAILURE_WARN_THRESHOLD: u32 = 5;

/// Shortest interval the background loop will probe at
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Current belief about backend reachability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_available: bool,
    pub last_error: Option<String>,
    pub using_fallback: bool,
}

/// The two externally visible health states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Degraded,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Healthy => write!(f, "Healthy"),
            Health::Degraded => write!(f, "Degraded"),
        }
    }
}

impl ConnectivityState {
    /// Optimistic starting belief, before any probe has run
    pub fn initial(force_fallback: bool) -> Self {
        Self {
            is_available: true,
            last_error: None,
            using_fallback: force_fallback,
        }
    }

    fn from_probe(result: &ProbeResult, force_fallback: bool) -> Self {
        if result.success {
            Self::initial(force_fallback)
        } else {
            Self {
                is_available: false,
                last_error: Some(
                    result
                        .error
                        .clone()
                        .unwrap_or_else(|| "Backend unreachable".to_string()),
                ),
                using_fallback: true,
            }
        }
    }

    /// Whether callers should be served fallback data
    pub fn health(&self) -> Health {
        if self.using_fallback {
            Health::Degraded
        } else {
            Health::Healthy
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.health() == Health::Degraded
    }
}

/// Read-only view handed to UI consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityStatus {
    pub is_backend_available: bool,
    pub last_error: Option<String>,
    pub use_fallback_data: bool,
}

impl From<&ConnectivityState> for ConnectivityStatus {
    fn from(state: &ConnectivityState) -> Self {
        Self {
            is_backend_available: state.is_available,
            last_error: state.last_error.clone(),
            use_fallback_data: state.using_fallback,
        }
    }
}

type Listener = Arc<dyn Fn(&ConnectivityState) + Send + Sync>;

/// State and probe shared between the monitor and its background task
struct Shared {
    probe: Arc<dyn Probe>,
    state: watch::Sender<ConnectivityState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    consecutive_failures: AtomicU32,
    force_fallback: bool,
    probe_requested: Notify,
    // Serializes probes so a retry and a scheduled tick cannot interleave
    probe_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    async fn probe_and_apply(&self) -> ConnectivityState {
        let _guard = self.probe_lock.lock().await;
        let result = self.probe.probe().await;
        self.apply(&result)
    }

    fn apply(&self, result: &ProbeResult) -> ConnectivityState {
        if result.success {
            self.consecutive_failures.store(0, Ordering::SeqCst);
        } else {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
            if failures == FAILURE_WARN_THRESHOLD {
                tracing::warn!("Backend probe has failed {} consecutive times", failures);
            }
        }

        let next = ConnectivityState::from_probe(result, self.force_fallback);
        let mut previous = None;
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            previous = Some(current.clone());
            *current = next.clone();
            true
        });

        if changed {
            let was_available = previous.map(|p| p.is_available).unwrap_or(true);
            match (was_available, next.is_available) {
                (true, false) => tracing::warn!(
                    "Backend unreachable, serving fallback data: {}",
                    next.last_error.as_deref().unwrap_or("unknown error")
                ),
                (false, true) => tracing::info!("Backend reachable again"),
                _ => tracing::debug!("Connectivity error changed: {:?}", next.last_error),
            }
            self.notify_listeners(&next);
        }

        next
    }

    fn notify_listeners(&self, state: &ConnectivityState) {
        // Listeners run outside the lock so they may subscribe or unsubscribe
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }
}

struct ProbeTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProbeTask {
    fn shutdown(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Owns [`ConnectivityState`] and the periodic probe that updates it.
///
/// The state is only written by probe results, either from the background
/// loop started with [`start`](Self::start) or from [`retry`](Self::retry).
/// Listeners are notified synchronously, and only when the state value
/// changes. Dropping the monitor stops the background loop.
pub struct ConnectivityMonitor {
    shared: Arc<Shared>,
    interval: Duration,
    task: Mutex<Option<ProbeTask>>,
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectivityMonitor {
    pub fn new(probe: Arc<dyn Probe>, config: &ConnectivityConfig) -> Self {
        let (state, _) = watch::channel(ConnectivityState::initial(config.force_fallback));
        Self {
            shared: Arc::new(Shared {
                probe,
                state,
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                consecutive_failures: AtomicU32::new(0),
                force_fallback: config.force_fallback,
                probe_requested: Notify::new(),
                probe_lock: tokio::sync::Mutex::new(()),
            }),
            interval: clamp_interval(Duration::from_secs(config.probe_interval_seconds)),
            task: Mutex::new(None),
        }
    }

    /// Monitor with a custom probe interval and no forced fallback
    pub fn with_interval(probe: Arc<dyn Probe>, interval: Duration) -> Self {
        let mut monitor = Self::new(probe, &ConnectivityConfig::default());
        monitor.interval = clamp_interval(interval);
        monitor
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one probe without touching the state
    pub async fn probe(&self) -> ProbeResult {
        self.shared.probe.probe().await
    }

    /// Probe now and every interval after. Calling again while running is a no-op.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if let Some(existing) = task.as_ref() {
            if !existing.handle.is_finished() {
                tracing::debug!("Connectivity monitor already running");
                return;
            }
        }

        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            probe_loop(shared, interval, loop_cancel).await;
        });

        tracing::info!(
            "Connectivity monitor started (interval {}s)",
            interval.as_secs()
        );
        *task = Some(ProbeTask { cancel, handle });
    }

    /// Cancel the periodic probe
    pub fn stop(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.shutdown();
            tracing::info!("Connectivity monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    /// Current belief
    pub fn state(&self) -> ConnectivityState {
        self.shared.state.borrow().clone()
    }

    pub fn health(&self) -> Health {
        self.shared.state.borrow().health()
    }

    pub fn status(&self) -> ConnectivityStatus {
        ConnectivityStatus::from(&*self.shared.state.borrow())
    }

    /// Probe immediately and return the resulting state. Subscribers have
    /// already been notified when this returns.
    pub async fn retry(&self) -> ConnectivityState {
        tracing::debug!("Connectivity retry requested");
        self.shared.probe_and_apply().await
    }

    /// [`retry`](Self::retry) returning the consumer view
    pub async fn retry_connection(&self) -> ConnectivityStatus {
        ConnectivityStatus::from(&self.retry().await)
    }

    /// Ask the background loop to probe without waiting for the next tick
    pub fn request_probe(&self) {
        self.shared.probe_requested.notify_one();
    }

    /// Register a listener called on every state change
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectivityState) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.shared.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Async view of the state for tasks that prefer awaiting changes
    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.shared.state.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).len()
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.shutdown();
        }
    }
}

/// Handle returned by [`ConnectivityMonitor::subscribe`]; dropping it unsubscribes
#[must_use = "dropping the subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

async fn probe_loop(shared: Arc<Shared>, interval: Duration, cancel: CancellationToken) {
    loop {
        // A probe still in flight at cancellation is dropped before it can apply
        let state = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Probe loop cancelled");
                break;
            }
            state = shared.probe_and_apply() => state,
        };
        tracing::debug!("Probe complete: {}", state.health());

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shared.probe_requested.notified() => {
                tracing::debug!("Out-of-band probe requested");
            }
            _ = cancel.cancelled() => {
                tracing::debug!("Probe loop cancelled");
                break;
            }
        }
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    if interval < MIN_PROBE_INTERVAL {
        tracing::warn!(
            "Probe interval {:?} is below {:?}; using {:?}",
            interval,
            MIN_PROBE_INTERVAL,
            MIN_PROBE_INTERVAL
        );
        MIN_PROBE_INTERVAL
    } else {
        interval
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
