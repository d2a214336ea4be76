//! Top-level console engine.
//!
//! [`Console`] wires the pollers, the history loader, the command dispatcher
//! and the settings manager to one shared [`Gateway`], and owns the
//! cross-cutting bits: the persisted theme preference and schedule
//! submission. Each collaborator keeps its own cadence and failure handling;
//! the console only starts and stops them together.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use farmlink_core::config::ConsoleConfig;
//! use farmlink_core::console::Console;
//! use farmlink_core::prefs::MemoryPreferences;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let console = Console::new(ConsoleConfig::default(), Arc::new(MemoryPreferences::new()))?;
//! console.start();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tracing::{info, warn};

use farmlink_types::ScheduleRequest;

use crate::actuators::ActuatorDispatcher;
use crate::alerts::AlertPoller;
use crate::config::ConsoleConfig;
use crate::error::Result;
use crate::gateway::{Gateway, GatewayClient};
use crate::history::{HistoryLoader, HistoryOptions};
use crate::prefs::{PreferenceStore, THEME_KEY, Theme};
use crate::schedule::{ScheduleFields, build_schedule};
use crate::settings::ThresholdManager;
use crate::telemetry::TelemetryPoller;

/// The assembled console engine.
pub struct Console {
    gateway: Arc<dyn Gateway>,
    telemetry: TelemetryPoller,
    alerts: AlertPoller,
    history: HistoryLoader,
    actuators: ActuatorDispatcher,
    thresholds: ThresholdManager,
    prefs: Arc<dyn PreferenceStore>,
    theme: StdMutex<Theme>,
}

impl Console {
    /// Build a console talking HTTP to the backend named in `config`.
    pub fn new(config: ConsoleConfig, prefs: Arc<dyn PreferenceStore>) -> Result<Self> {
        let gateway: Arc<dyn Gateway> = Arc::new(GatewayClient::new(&config.base_url)?);
        Ok(Self::with_gateway(gateway, config, prefs))
    }

    /// Build a console over an explicit gateway, e.g. a mock in tests.
    pub fn with_gateway(
        gateway: Arc<dyn Gateway>,
        config: ConsoleConfig,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Self {
        let theme = match prefs.get(THEME_KEY) {
            Ok(Some(stored)) => Theme::from_stored(&stored),
            Ok(None) => Theme::default(),
            Err(e) => {
                warn!(error = %e, "failed to read theme preference, using default");
                Theme::default()
            }
        };

        let history_options = HistoryOptions {
            refresh_period: config.history_interval(),
            ..HistoryOptions::default()
        };

        Self {
            telemetry: TelemetryPoller::new(Arc::clone(&gateway), config.telemetry_interval()),
            alerts: AlertPoller::new(Arc::clone(&gateway), config.alert_interval()),
            history: HistoryLoader::with_options(Arc::clone(&gateway), history_options),
            actuators: ActuatorDispatcher::new(Arc::clone(&gateway)),
            thresholds: ThresholdManager::new(Arc::clone(&gateway)),
            gateway,
            prefs,
            theme: StdMutex::new(theme),
        }
    }

    /// Start every background schedule.
    pub fn start(&self) {
        info!("starting console engine");
        self.telemetry.start();
        self.alerts.start();
        self.history.start();
    }

    /// Stop every background schedule.
    ///
    /// In-flight fetches are dropped; completions arriving after shutdown
    /// are no-ops.
    pub fn shutdown(&self) {
        info!("stopping console engine");
        self.telemetry.stop();
        self.alerts.stop();
        self.history.stop();
    }

    /// The telemetry poller.
    pub fn telemetry(&self) -> &TelemetryPoller {
        &self.telemetry
    }

    /// The alert poller.
    pub fn alerts(&self) -> &AlertPoller {
        &self.alerts
    }

    /// The history loader.
    pub fn history(&self) -> &HistoryLoader {
        &self.history
    }

    /// The actuator command dispatcher.
    pub fn actuators(&self) -> &ActuatorDispatcher {
        &self.actuators
    }

    /// The threshold settings manager.
    pub fn thresholds(&self) -> &ThresholdManager {
        &self.thresholds
    }

    /// Validate operator input and submit the resulting schedule.
    ///
    /// A validation failure is returned without touching the network; only a
    /// request that passed validation can fail with a transport error.
    pub async fn submit_schedule(&self, fields: &ScheduleFields) -> Result<ScheduleRequest> {
        let request = build_schedule(fields)?;
        self.gateway.create_schedule(&request).await?;
        info!(start_time = %request.start_time, "schedule submitted");
        Ok(request)
    }

    /// Current display theme.
    pub fn theme(&self) -> Theme {
        self.theme.lock().map(|t| *t).unwrap_or_default()
    }

    /// Flip the display theme and persist the choice.
    ///
    /// The in-memory theme changes even if persistence fails, so the session
    /// keeps the operator's choice; the error is still surfaced.
    pub fn toggle_theme(&self) -> Result<Theme> {
        let next = {
            let Ok(mut theme) = self.theme.lock() else {
                return Ok(self.theme());
            };
            *theme = theme.toggled();
            *theme
        };
        self.prefs.set(THEME_KEY, next.as_str())?;
        Ok(next)
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use crate::prefs::MemoryPreferences;
    use crate::schedule::{ScheduleError, ScheduleField};
    use crate::error::Error;

    fn console_over(mock: &Arc<MockGateway>) -> Console {
        Console::with_gateway(
            Arc::clone(mock) as Arc<dyn Gateway>,
            ConsoleConfig::default(),
            Arc::new(MemoryPreferences::new()),
        )
    }

    fn valid_fields() -> ScheduleFields {
        ScheduleFields {
            hour: "6".to_string(),
            minute: "0".to_string(),
            day: "15".to_string(),
            month: "7".to_string(),
            year: "2025".to_string(),
            duration_minutes: "10".to_string(),
            repeat_daily: true,
        }
    }

    #[tokio::test]
    async fn test_submit_schedule_reaches_gateway() {
        let mock = Arc::new(MockGateway::new());
        let console = console_over(&mock);

        let request = console.submit_schedule(&valid_fields()).await.unwrap();
        assert_eq!(request.start_time, "2025-07-15T06:00:00.000+07:00");
        assert_eq!(mock.last_schedule().await, Some(request));
    }

    #[tokio::test]
    async fn test_invalid_schedule_never_reaches_network() {
        let mock = Arc::new(MockGateway::new());
        let console = console_over(&mock);

        let fields = ScheduleFields {
            hour: String::new(),
            ..valid_fields()
        };
        let result = console.submit_schedule(&fields).await;
        assert!(matches!(
            result,
            Err(Error::Schedule(ScheduleError::MissingField(ScheduleField::Hour)))
        ));
        assert_eq!(mock.schedule_calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_distinct_from_validation() {
        let mock = Arc::new(MockGateway::new());
        let console = console_over(&mock);

        mock.fail_with("backend down").await;
        let result = console.submit_schedule(&valid_fields()).await;
        assert!(matches!(result, Err(Error::Api { .. })));
        assert_eq!(mock.schedule_calls(), 1);
    }

    #[tokio::test]
    async fn test_theme_defaults_dark_and_persists_toggle() {
        let mock = Arc::new(MockGateway::new());
        let prefs = Arc::new(MemoryPreferences::new());
        let console = Console::with_gateway(
            Arc::clone(&mock) as Arc<dyn Gateway>,
            ConsoleConfig::default(),
            Arc::clone(&prefs) as Arc<dyn PreferenceStore>,
        );

        assert_eq!(console.theme(), Theme::Dark);
        assert_eq!(console.toggle_theme().unwrap(), Theme::Light);
        assert_eq!(prefs.get(THEME_KEY).unwrap().as_deref(), Some("light"));

        // A new console over the same store resumes the stored theme.
        drop(console);
        let console = Console::with_gateway(
            mock as Arc<dyn Gateway>,
            ConsoleConfig::default(),
            prefs as Arc<dyn PreferenceStore>,
        );
        assert_eq!(console.theme(), Theme::Light);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_all_schedules_and_shutdown_stops_them() {
        let mock = Arc::new(MockGateway::new());
        let console = console_over(&mock);

        console.start();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(mock.telemetry_calls(), 1);
        assert_eq!(mock.alert_calls(), 1);
        assert_eq!(mock.history_calls(), 1);

        console.shutdown();
        tokio::time::sleep(std::time::Duration::from_secs(600)).await;
        assert_eq!(mock.telemetry_calls(), 1);
        assert_eq!(mock.alert_calls(), 1);
        assert_eq!(mock.history_calls(), 1);
    }
}
