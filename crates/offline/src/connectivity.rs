//! Connectivity detection.
//!
//! A [`ConnectivityProbe`] answers "is the marketplace reachable right now";
//! the [`ConnectivityMonitor`] turns successive answers into edge-triggered
//! connected/disconnected notifications.
//!
//! The monitor fails open: when the probe cannot answer at all, the device
//! is reported connected so that direct calls keep being attempted.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use staffsync_events::{ListenerSet, Subscription};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connectivity signal unavailable: {0}")]
    Unavailable(String),
}

/// Source of the platform's reachability signal.
#[async_trait::async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// `Ok(true)` when the backend is reachable, `Ok(false)` when it is not,
    /// `Err` when reachability cannot be determined.
    async fn probe(&self) -> Result<bool, ProbeError>;
}

/// Probe that issues `GET {api_url}/health`.
///
/// Any HTTP response counts as connected (even an error status: the network
/// path works); a transport failure counts as disconnected.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpHealthProbe {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let mut url = reqwest::Url::parse(api_url)
            .map_err(|e| ProbeError::Unavailable(format!("invalid api url '{api_url}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ProbeError::Unavailable(format!("api url '{api_url}' cannot be a base")))?
            .pop_if_empty()
            .push("health");

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Unavailable(e.to_string()))?;

        Ok(Self { client, url })
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for HttpHealthProbe {
    async fn probe(&self) -> Result<bool, ProbeError> {
        match self.client.get(self.url.clone()).send().await {
            Ok(resp) => {
                tracing::trace!(status = %resp.status(), "health probe answered");
                Ok(true)
            }
            Err(err) => {
                tracing::debug!(error = %err, "health probe failed");
                Ok(false)
            }
        }
    }
}

/// Probe with a settable answer (`None` = signal unavailable).
#[derive(Debug)]
pub struct StaticProbe {
    answer: Mutex<Option<bool>>,
}

impl StaticProbe {
    pub fn new(answer: Option<bool>) -> Self {
        Self {
            answer: Mutex::new(answer),
        }
    }

    pub fn connected() -> Self {
        Self::new(Some(true))
    }

    pub fn disconnected() -> Self {
        Self::new(Some(false))
    }

    pub fn unavailable() -> Self {
        Self::new(None)
    }

    pub fn set(&self, answer: Option<bool>) {
        *self.answer.lock().unwrap_or_else(PoisonError::into_inner) = answer;
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn probe(&self) -> Result<bool, ProbeError> {
        let answer = *self.answer.lock().unwrap_or_else(PoisonError::into_inner);
        answer.ok_or_else(|| ProbeError::Unavailable("static probe has no answer".into()))
    }
}

struct MonitorInner {
    probe: Arc<dyn ConnectivityProbe>,
    listeners: ListenerSet<bool>,
    last: Mutex<Option<bool>>,
    // Held across compare-and-emit so deliveries follow the order of stored
    // observations.
    emitting: Mutex<()>,
}

/// Edge-triggered connectivity monitor.
///
/// Cheap to clone; clones share listeners and the last observation.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl core::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("last_known", &self.last_known())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl ConnectivityMonitor {
    pub fn new(probe: Arc<dyn ConnectivityProbe>) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                probe,
                listeners: ListenerSet::new(),
                last: Mutex::new(None),
                emitting: Mutex::new(()),
            }),
        }
    }

    /// Register a transition listener. Only changes are delivered.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(on_change)
    }

    /// Ask the probe once, without notifying anyone.
    pub async fn check_is_connected(&self) -> bool {
        match self.inner.probe.probe().await {
            Ok(connected) => connected,
            Err(err) => {
                tracing::warn!(error = %err, "connectivity unknown; assuming connected");
                true
            }
        }
    }

    /// Feed an observation. Listeners run only when it differs from the
    /// previous one; the first observation always counts as a change.
    ///
    /// Returns whether listeners were notified. Concurrent reports are
    /// serialized, so the last delivered value always matches
    /// [`last_known`](Self::last_known). Listeners must not call `report`.
    pub fn report(&self, connected: bool) -> bool {
        let _emitting = self
            .inner
            .emitting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = {
            let mut last = self.inner.last.lock().unwrap_or_else(PoisonError::into_inner);
            last.replace(connected)
        };
        if previous == Some(connected) {
            return false;
        }

        tracing::info!(connected, ?previous, "connectivity changed");
        self.inner.listeners.emit(connected);
        true
    }

    /// Probe, then report the answer. Returns the observed state.
    pub async fn refresh(&self) -> bool {
        let connected = self.check_is_connected().await;
        self.report(connected);
        connected
    }

    /// Last observation, `None` before the first one.
    pub fn last_known(&self) -> Option<bool> {
        *self.inner.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Poll the probe every `interval` on the current tokio runtime.
    ///
    /// The first poll happens one interval from now.
    pub fn watch(&self, interval: Duration) -> WatchHandle {
        let interval = interval.max(Duration::from_millis(1));
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);
        let monitor = self.clone();

        let task = tokio::spawn(async move {
            tracing::debug!(?interval, "connectivity watcher started");
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = signal.notified() => break,
                    _ = ticker.tick() => {
                        monitor.refresh().await;
                    }
                }
            }

            tracing::debug!("connectivity watcher stopped");
        });

        WatchHandle { shutdown, task }
    }
}

/// Handle to a polling task started by [`ConnectivityMonitor::watch`].
#[derive(Debug)]
pub struct WatchHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop polling and wait for the task to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "connectivity watcher ended abnormally");
        }
    }
}
