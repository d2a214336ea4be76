//! Active-alert polling.
//!
//! The [`AlertPoller`] fetches the active alert list immediately on
//! [`start`](AlertPoller::start) and then every 30 seconds in production.
//! The displayed list is replaced wholesale on each success; a failure is
//! logged and the previously displayed list is retained (fail-soft).
//!
//! "Not yet loaded" and "zero alerts" are distinct states: the badge count
//! is meaningful only once the first poll has completed, and an empty list
//! is the all-clear state, not a loading state.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use farmlink_types::Alert;

use crate::error::Result;
use crate::gateway::Gateway;

/// Read-only view of the alert state.
#[derive(Debug, Clone, Default)]
pub struct AlertView {
    /// `None` until the first poll completes; `Some(vec![])` is the distinct
    /// all-clear state.
    pub alerts: Option<Vec<Alert>>,
    /// Transient error from the last failed poll, cleared on success.
    pub error: Option<String>,
}

impl AlertView {
    /// Whether at least one poll has completed.
    pub fn is_loaded(&self) -> bool {
        self.alerts.is_some()
    }

    /// Badge count; zero both before the first poll and when all clear, use
    /// [`is_loaded`](Self::is_loaded) to tell the two apart.
    pub fn count(&self) -> usize {
        self.alerts.as_ref().map_or(0, Vec::len)
    }

    /// All-clear: loaded and empty.
    pub fn is_all_clear(&self) -> bool {
        self.alerts.as_ref().is_some_and(Vec::is_empty)
    }
}

struct AlertState {
    view: AlertView,
    applied_generation: u64,
}

struct Inner {
    gateway: Arc<dyn Gateway>,
    issued: AtomicU64,
    state: RwLock<AlertState>,
    cancel: CancellationToken,
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn apply(&self, generation: u64, outcome: Result<Vec<Alert>>) {
        let mut state = self.state.write().await;
        if generation <= state.applied_generation {
            debug!(generation, "discarding superseded alert result");
            return;
        }
        state.applied_generation = generation;
        match outcome {
            Ok(alerts) => {
                state.view.alerts = Some(alerts);
                state.view.error = None;
            }
            Err(e) => {
                warn!(error = %e, "alert poll failed, keeping previous list");
                state.view.error = Some(e.to_string());
            }
        }
    }

    async fn fetch_once(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let generation = self.next_generation();
        let outcome = self.gateway.alerts().await;
        self.apply(generation, outcome).await;
    }
}

/// Polls the active alert list on a fixed cadence.
pub struct AlertPoller {
    inner: Arc<Inner>,
    period: Duration,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl AlertPoller {
    /// Create a poller fetching through `gateway` every `period`.
    pub fn new(gateway: Arc<dyn Gateway>, period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                issued: AtomicU64::new(0),
                state: RwLock::new(AlertState {
                    view: AlertView::default(),
                    applied_generation: 0,
                }),
                cancel: CancellationToken::new(),
            }),
            period,
            task: StdMutex::new(None),
        }
    }

    /// Begin polling: an immediate fetch, then one per period.
    pub fn start(&self) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let period = self.period;
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => {
                        debug!("alert poller stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = inner.cancel.cancelled() => break,
                            _ = inner.fetch_once() => {}
                        }
                    }
                }
            }
        }));
    }

    /// Cancel the polling schedule.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Current view of the alert state.
    pub async fn view(&self) -> AlertView {
        self.inner.state.read().await.view.clone()
    }

    /// Clear all active alerts on the backend.
    ///
    /// On success the displayed list becomes the empty (all-clear) list
    /// without waiting for the next poll tick.
    pub async fn clear(&self) -> Result<()> {
        self.inner.gateway.clear_alerts().await?;
        info!("cleared active alerts");
        let generation = self.inner.next_generation();
        self.inner.apply(generation, Ok(Vec::new())).await;
        Ok(())
    }

    /// Whether the background schedule is still running.
    pub fn is_active(&self) -> bool {
        match self.task.lock() {
            Ok(task) => task.as_ref().is_some_and(|t| !t.is_finished()),
            Err(_) => false,
        }
    }
}

impl Drop for AlertPoller {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}
