//! Telemetry snapshot polling.
//!
//! The [`TelemetryPoller`] fetches the latest sensor snapshot immediately on
//! [`start`](TelemetryPoller::start) and then on a fixed cadence (5 minutes
//! in production). Each successful fetch replaces the [`SensorSnapshot`]
//! wholesale and records the completion time; a failed fetch leaves the
//! previous snapshot untouched and surfaces a transient error string.
//!
//! A manual [`refresh`](TelemetryPoller::refresh) can race the timer. Every
//! issued fetch takes a monotonically increasing generation, and a result is
//! applied only if its generation is newer than the last applied one, so a
//! slow response can never overwrite data from a poll that completed after
//! it. Stopping the poller cancels the schedule; completions arriving after
//! teardown are no-ops.

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

use farmlink_types::SensorSnapshot;

use crate::gateway::Gateway;

/// Read-only view of the telemetry state, for the rendering collaborator.
#[derive(Debug, Clone, Default)]
pub struct TelemetryView {
    /// The most recently completed snapshot, if any poll has succeeded.
    pub snapshot: Option<SensorSnapshot>,
    /// Completion time of the last successful poll.
    pub last_update: Option<OffsetDateTime>,
    /// Whether a fetch is currently in flight.
    pub loading: bool,
    /// Transient error from the last failed poll, cleared on success.
    pub error: Option<String>,
}

struct TelemetryState {
    view: TelemetryView,
    /// Generation of the last applied result; older completions are dropped.
    applied_generation: u64,
}

struct Inner {
    gateway: Arc<dyn Gateway>,
    issued: AtomicU64,
    state: RwLock<TelemetryState>,
    cancel: CancellationToken,
}

impl Inner {
    async fn fetch_once(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.view.loading = true;
        }

        debug!(generation, "fetching telemetry snapshot");
        let result = self.gateway.latest_telemetry().await;

        let mut state = self.state.write().await;
        state.view.loading = false;
        if generation <= state.applied_generation {
            debug!(generation, "discarding superseded telemetry result");
            return;
        }
        state.applied_generation = generation;

        match result {
            Ok(readings) => {
                let now = OffsetDateTime::now_utc();
                state.view.snapshot = Some(SensorSnapshot::from_readings(&readings, now));
                state.view.last_update = Some(now);
                state.view.error = None;
            }
            Err(e) => {
                warn!(error = %e, "telemetry poll failed, keeping previous snapshot");
                state.view.error = Some(e.to_string());
            }
        }
    }
}

/// Polls the latest sensor snapshot on a fixed cadence.
pub struct TelemetryPoller {
    inner: Arc<Inner>,
    period: Duration,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl TelemetryPoller {
    /// Create a poller fetching through `gateway` every `period`.
    pub fn new(gateway: Arc<dyn Gateway>, period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                issued: AtomicU64::new(0),
                state: RwLock::new(TelemetryState {
                    view: TelemetryView::default(),
                    applied_generation: 0,
                }),
                cancel: CancellationToken::new(),
            }),
            period,
            task: StdMutex::new(None),
        }
    }

    /// Begin polling: an immediate fetch, then one per period.
    ///
    /// Calling `start` again while the schedule is running is a no-op.
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
                        debug!("telemetry poller stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Cancellation mid-fetch drops the request so a late
                        // completion cannot mutate state after teardown.
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

    /// Trigger an out-of-band fetch, e.g. from a refresh button.
    ///
    /// Safe to race the timer: generation tracking ensures the snapshot
    /// always reflects the most recently completed poll.
    pub async fn refresh(&self) {
        self.inner.fetch_once().await;
    }

    /// Current view of the telemetry state.
    pub async fn view(&self) -> TelemetryView {
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

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use farmlink_types::{Metric, TelemetryReadings};

    fn poller(mock: &Arc<MockGateway>) -> TelemetryPoller {
        TelemetryPoller::new(
            Arc::clone(mock) as Arc<dyn Gateway>,
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_refresh_rounds_and_stores_snapshot() {
        let mock = Arc::new(MockGateway::new());
        mock.set_readings(TelemetryReadings {
            temperature: Some(23.456),
            humidity: None,
            soil_moisture: Some(40.0),
            light_level: Some(1200.0),
        })
        .await;

        let poller = poller(&mock);
        poller.refresh().await;

        let view = poller.view().await;
        let snapshot = view.snapshot.unwrap();
        assert_eq!(snapshot.display(Metric::Temperature).as_deref(), Some("23.5"));
        assert_eq!(snapshot.display(Metric::Humidity), None);
        assert_eq!(snapshot.display(Metric::SoilMoisture).as_deref(), Some("40.0"));
        assert_eq!(snapshot.display(Metric::LightLevel).as_deref(), Some("1200"));
        assert!(view.last_update.is_some());
        assert!(view.error.is_none());
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let mock = Arc::new(MockGateway::new());
        mock.set_readings(TelemetryReadings {
            temperature: Some(20.0),
            ..Default::default()
        })
        .await;

        let poller = poller(&mock);
        poller.refresh().await;
        let first = poller.view().await.snapshot.unwrap();

        mock.fail_with("backend down").await;
        poller.refresh().await;

        let view = poller.view().await;
        assert_eq!(view.snapshot, Some(first));
        assert!(view.error.as_deref().unwrap().contains("backend down"));
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let mock = Arc::new(MockGateway::new());
        mock.fail_with("flaky").await;

        let poller = poller(&mock);
        poller.refresh().await;
        assert!(poller.view().await.error.is_some());

        mock.succeed().await;
        poller.refresh().await;
        let view = poller.view().await;
        assert!(view.error.is_none());
        assert!(view.snapshot.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_immediately_and_on_period() {
        let mock = Arc::new(MockGateway::new());
        let poller = TelemetryPoller::new(
            Arc::clone(&mock) as Arc<dyn Gateway>,
            Duration::from_secs(300),
        );

        poller.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mock.telemetry_calls(), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(mock.telemetry_calls(), 2);

        poller.stop();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(mock.telemetry_calls(), 2);
        assert!(!poller.is_active());
    }

    #[tokio::test]
    async fn test_start_twice_spawns_one_schedule() {
        let mock = Arc::new(MockGateway::new());
        let poller = poller(&mock);
        poller.start();
        poller.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mock.telemetry_calls(), 1);
        poller.stop();
    }

    #[tokio::test]
    async fn test_refresh_after_stop_is_noop() {
        let mock = Arc::new(MockGateway::new());
        let poller = poller(&mock);
        poller.stop();
        poller.refresh().await;
        assert_eq!(mock.telemetry_calls(), 0);
        assert!(poller.view().await.snapshot.is_none());
    }
}
