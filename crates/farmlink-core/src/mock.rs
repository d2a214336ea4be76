//! In-memory [`Gateway`] implementation for tests.
//!
//! [`MockGateway`] serves canned state, records every mutating call, and can
//! inject failures and artificial latency. It backs the unit tests of the
//! pollers and the dispatcher as well as the integration suite, so none of
//! them need a running backend.
//!
//! # Example
//!
//! ```
//! use farmlink_core::mock::MockGateway;
//! use farmlink_core::gateway::Gateway;
//! use farmlink_types::TelemetryReadings;
//!
//! # async fn example() {
//! let mock = MockGateway::new();
//! mock.set_readings(TelemetryReadings {
//!     temperature: Some(21.0),
//!     ..Default::default()
//! })
//! .await;
//! let readings = mock.latest_telemetry().await.unwrap();
//! assert_eq!(readings.temperature, Some(21.0));
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use farmlink_types::{
    ActuatorChannel, Alert, Metric, ScheduleRequest, TelemetryReadings, ThresholdSettings,
    TrendPoint,
};

use crate::error::{Error, Result};
use crate::gateway::{Gateway, HistoryQuery};

struct MockState {
    readings: TelemetryReadings,
    history: HashMap<Metric, Vec<TrendPoint>>,
    alerts: Vec<Alert>,
    thresholds: ThresholdSettings,
    saved_thresholds: Option<ThresholdSettings>,
    actuator_log: Vec<(ActuatorChannel, bool)>,
    schedules: Vec<ScheduleRequest>,
    fail_message: Option<String>,
}

/// Scriptable in-memory gateway.
pub struct MockGateway {
    state: RwLock<MockState>,
    latency_ms: AtomicU64,
    telemetry_calls: AtomicU32,
    history_calls: AtomicU32,
    alert_calls: AtomicU32,
    clear_alert_calls: AtomicU32,
    threshold_calls: AtomicU32,
    actuator_calls: AtomicU32,
    schedule_calls: AtomicU32,
}

impl MockGateway {
    /// Create a mock with empty readings, no alerts, no history and
    /// default thresholds.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState {
                readings: TelemetryReadings::default(),
                history: HashMap::new(),
                alerts: Vec::new(),
                thresholds: ThresholdSettings::default(),
                saved_thresholds: None,
                actuator_log: Vec::new(),
                schedules: Vec::new(),
                fail_message: None,
            }),
            latency_ms: AtomicU64::new(0),
            telemetry_calls: AtomicU32::new(0),
            history_calls: AtomicU32::new(0),
            alert_calls: AtomicU32::new(0),
            clear_alert_calls: AtomicU32::new(0),
            threshold_calls: AtomicU32::new(0),
            actuator_calls: AtomicU32::new(0),
            schedule_calls: AtomicU32::new(0),
        }
    }

    // ======================================================================
    // Scripting
    // ======================================================================

    /// Set the readings served by [`Gateway::latest_telemetry`].
    pub async fn set_readings(&self, readings: TelemetryReadings) {
        self.state.write().await.readings = readings;
    }

    /// Set the per-metric series served by [`Gateway::telemetry_history`].
    pub async fn set_history(&self, history: HashMap<Metric, Vec<TrendPoint>>) {
        self.state.write().await.history = history;
    }

    /// Set the alert list served by [`Gateway::alerts`].
    pub async fn set_alerts(&self, alerts: Vec<Alert>) {
        self.state.write().await.alerts = alerts;
    }

    /// Set the settings served by [`Gateway::thresholds`].
    pub async fn set_thresholds(&self, thresholds: ThresholdSettings) {
        self.state.write().await.thresholds = thresholds;
    }

    /// Make every subsequent call fail with the given message.
    pub async fn fail_with(&self, message: &str) {
        self.state.write().await.fail_message = Some(message.to_string());
    }

    /// Make subsequent calls succeed again.
    pub async fn succeed(&self) {
        self.state.write().await.fail_message = None;
    }

    /// Delay every call by `latency` before it resolves.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    // ======================================================================
    // Recorded activity
    // ======================================================================

    /// Number of [`Gateway::latest_telemetry`] calls.
    pub fn telemetry_calls(&self) -> u32 {
        self.telemetry_calls.load(Ordering::SeqCst)
    }

    /// Number of [`Gateway::telemetry_history`] calls.
    pub fn history_calls(&self) -> u32 {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// Number of [`Gateway::alerts`] calls.
    pub fn alert_calls(&self) -> u32 {
        self.alert_calls.load(Ordering::SeqCst)
    }

    /// Number of [`Gateway::clear_alerts`] calls.
    pub fn clear_alert_calls(&self) -> u32 {
        self.clear_alert_calls.load(Ordering::SeqCst)
    }

    /// Number of threshold calls, reads and writes combined.
    pub fn threshold_calls(&self) -> u32 {
        self.threshold_calls.load(Ordering::SeqCst)
    }

    /// Number of [`Gateway::set_actuator`] calls.
    pub fn actuator_calls(&self) -> u32 {
        self.actuator_calls.load(Ordering::SeqCst)
    }

    /// Number of [`Gateway::create_schedule`] calls.
    pub fn schedule_calls(&self) -> u32 {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    /// Every successful actuator command in order.
    pub async fn actuator_log(&self) -> Vec<(ActuatorChannel, bool)> {
        self.state.read().await.actuator_log.clone()
    }

    /// The settings from the most recent successful threshold update.
    pub async fn last_saved_thresholds(&self) -> Option<ThresholdSettings> {
        self.state.read().await.saved_thresholds.clone()
    }

    /// The most recently accepted schedule.
    pub async fn last_schedule(&self) -> Option<ScheduleRequest> {
        self.state.read().await.schedules.last().cloned()
    }

    // ======================================================================
    // Internals
    // ======================================================================

    async fn begin(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        match &self.state.read().await.fail_message {
            Some(message) => Err(Error::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn latest_telemetry(&self) -> Result<TelemetryReadings> {
        self.telemetry_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        Ok(self.state.read().await.readings.clone())
    }

    async fn telemetry_history(
        &self,
        _query: &HistoryQuery,
    ) -> Result<HashMap<Metric, Vec<TrendPoint>>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        Ok(self.state.read().await.history.clone())
    }

    async fn set_actuator(&self, channel: ActuatorChannel, state: bool) -> Result<()> {
        self.actuator_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        self.state.write().await.actuator_log.push((channel, state));
        Ok(())
    }

    async fn create_schedule(&self, request: &ScheduleRequest) -> Result<()> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        self.state.write().await.schedules.push(request.clone());
        Ok(())
    }

    async fn thresholds(&self) -> Result<ThresholdSettings> {
        self.threshold_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        Ok(self.state.read().await.thresholds.clone())
    }

    async fn update_thresholds(&self, settings: &ThresholdSettings) -> Result<()> {
        self.threshold_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        self.state.write().await.saved_thresholds = Some(settings.clone());
        Ok(())
    }

    async fn alerts(&self) -> Result<Vec<Alert>> {
        self.alert_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        Ok(self.state.read().await.alerts.clone())
    }

    async fn clear_alerts(&self) -> Result<()> {
        self.clear_alert_calls.fetch_add(1, Ordering::SeqCst);
        self.begin().await?;
        self.state.write().await.alerts.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_injection_toggles() {
        let mock = MockGateway::new();
        mock.fail_with("down").await;
        assert!(mock.latest_telemetry().await.is_err());

        mock.succeed().await;
        assert!(mock.latest_telemetry().await.is_ok());
        assert_eq!(mock.telemetry_calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_carries_message() {
        let mock = MockGateway::new();
        mock.fail_with("relay offline").await;
        let err = mock.clear_alerts().await.unwrap_err();
        assert!(err.to_string().contains("relay offline"));
    }

    #[tokio::test]
    async fn test_actuator_log_records_order() {
        let mock = MockGateway::new();
        let channel = ActuatorChannel::KNOWN[0];
        mock.set_actuator(channel, true).await.unwrap();
        mock.set_actuator(channel, false).await.unwrap();
        assert_eq!(
            mock.actuator_log().await,
            vec![(channel, true), (channel, false)]
        );
    }

    #[tokio::test]
    async fn test_clear_alerts_empties_served_list() {
        let mock = MockGateway::new();
        mock.set_alerts(vec![Alert {
            id: "a1".to_string(),
            message: "hot".to_string(),
            severity: Default::default(),
            timestamp: "2025-06-01T00:00:00Z".to_string(),
        }])
        .await;

        assert_eq!(mock.alerts().await.unwrap().len(), 1);
        mock.clear_alerts().await.unwrap();
        assert!(mock.alerts().await.unwrap().is_empty());
    }
}
