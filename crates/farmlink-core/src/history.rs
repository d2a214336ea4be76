//! Historical aggregate series loading.
//!
//! The [`HistoryLoader`] requests a bucketed aggregate ("AVG") series for
//! the trailing window ending now, for the four fixed metrics, and reshapes
//! the response into one ordered point list per metric. Metrics missing from
//! the response map to an empty point list, not an error. While active it
//! re-fetches every 5 minutes, replacing the entire per-metric map wholesale
//! each time; superseded in-flight results are discarded by generation,
//! like the other pollers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use farmlink_types::{Metric, TrendPoint};

use crate::gateway::{Aggregation, Gateway, HistoryQuery};

/// Parameters for the history window and refresh cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryOptions {
    /// Length of the trailing window. Default: 60 minutes.
    pub window: Duration,
    /// Aggregation bucket width. Default: 5 minutes.
    pub bucket: Duration,
    /// Server-side aggregation. Default: AVG.
    pub aggregation: Aggregation,
    /// How often to re-fetch while active. Default: 5 minutes.
    pub refresh_period: Duration,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60 * 60),
            bucket: Duration::from_millis(300_000),
            aggregation: Aggregation::Avg,
            refresh_period: Duration::from_millis(300_000),
        }
    }
}

/// Read-only view of the per-metric history series.
#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    /// One ordered point list per metric. Always contains an entry for every
    /// metric once loaded, empty when the backend returned nothing for it.
    pub series: HashMap<Metric, Vec<TrendPoint>>,
    /// Whether at least one load has completed successfully.
    pub loaded: bool,
    /// Transient error from the last failed load, cleared on success.
    pub error: Option<String>,
}

impl HistoryView {
    /// Points for a metric, empty when not loaded or absent.
    pub fn points(&self, metric: Metric) -> &[TrendPoint] {
        self.series.get(&metric).map_or(&[], Vec::as_slice)
    }
}

struct HistoryState {
    view: HistoryView,
    applied_generation: u64,
}

struct Inner {
    gateway: Arc<dyn Gateway>,
    options: HistoryOptions,
    issued: AtomicU64,
    state: RwLock<HistoryState>,
    cancel: CancellationToken,
}

impl Inner {
    async fn load_once(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        let end = OffsetDateTime::now_utc();
        let query = HistoryQuery {
            start: end - self.options.window,
            end,
            aggregation: self.options.aggregation,
            interval: self.options.bucket,
        };
        debug!(generation, window_secs = self.options.window.as_secs(), "loading history window");
        let result = self.gateway.telemetry_history(&query).await;

        let mut state = self.state.write().await;
        if generation <= state.applied_generation {
            debug!(generation, "discarding superseded history result");
            return;
        }
        state.applied_generation = generation;

        match result {
            Ok(mut series) => {
                for metric in Metric::ALL {
                    let points = series.entry(metric).or_default();
                    points.sort_by_key(|p| p.ts);
                }
                state.view.series = series;
                state.view.loaded = true;
                state.view.error = None;
            }
            Err(e) => {
                warn!(error = %e, "history load failed, keeping previous series");
                state.view.error = Some(e.to_string());
            }
        }
    }
}

/// Loads and refreshes the per-metric aggregate series.
pub struct HistoryLoader {
    inner: Arc<Inner>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl HistoryLoader {
    /// Create a loader with default window and cadence.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_options(gateway, HistoryOptions::default())
    }

    /// Create a loader with custom options.
    pub fn with_options(gateway: Arc<dyn Gateway>, options: HistoryOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                options,
                issued: AtomicU64::new(0),
                state: RwLock::new(HistoryState {
                    view: HistoryView::default(),
                    applied_generation: 0,
                }),
                cancel: CancellationToken::new(),
            }),
            task: StdMutex::new(None),
        }
    }

    /// Begin loading: an immediate fetch, then one per refresh period.
    pub fn start(&self) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let period = inner.options.refresh_period;
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => {
                        debug!("history loader stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = inner.cancel.cancelled() => break,
                            _ = inner.load_once() => {}
                        }
                    }
                }
            }
        }));
    }

    /// Cancel the refresh schedule.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Trigger an out-of-band load.
    pub async fn refresh(&self) {
        self.inner.load_once().await;
    }

    /// Current view of the history series.
    pub async fn view(&self) -> HistoryView {
        self.inner.state.read().await.view.clone()
    }

    /// Whether the background schedule is still running.
    pub fn is_active(&self) -> bool {
        match self.task.lock() {
            Ok(task) => task.as_ref().is_some_and(|t| !t.is_finished()),
            Err(_) => false,
        }
    }
}

impl Drop for HistoryLoader {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}
