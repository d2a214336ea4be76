//! Threshold settings management.
//!
//! The [`ThresholdManager`] owns an editable draft of the sparse threshold
//! configuration. [`load`](ThresholdManager::load) pulls the server copy
//! into the draft, mapping every server-absent bound to the explicit unset
//! state (`None`), never to zero. [`save`](ThresholdManager::save) submits
//! the draft with every unset bound as an explicit JSON null; a failed save
//! leaves the draft unchanged so the operator can retry. A successful save
//! surfaces a status message that clears itself after 3 seconds.
//!
//! `min <= max` per metric is NOT enforced; the backend owns that check.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use farmlink_types::{BoundKind, Metric, ThresholdSettings};

use crate::error::Result;
use crate::gateway::Gateway;

/// How long a save-success status stays visible.
const STATUS_TTL: Duration = Duration::from_millis(3000);

/// Outcome surfaced to the operator after a settings operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsStatus {
    /// Save acknowledged by the backend.
    Saved,
    /// Operation failed with a short error message.
    Failed(String),
}

struct Inner {
    gateway: Arc<dyn Gateway>,
    draft: RwLock<ThresholdSettings>,
    status: RwLock<Option<SettingsStatus>>,
    /// Bumped on every status change so a stale clear timer does nothing.
    status_epoch: AtomicU64,
}

impl Inner {
    async fn set_status(self: &Arc<Self>, status: Option<SettingsStatus>) -> u64 {
        let epoch = self.status_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.status.write().await = status;
        epoch
    }

    fn schedule_status_clear(self: &Arc<Self>, epoch: u64) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(STATUS_TTL).await;
            if inner.status_epoch.load(Ordering::SeqCst) == epoch {
                *inner.status.write().await = None;
            }
        });
    }
}

/// Loads, edits and persists the sparse threshold configuration.
pub struct ThresholdManager {
    inner: Arc<Inner>,
}

impl ThresholdManager {
    /// Create a manager with an all-unset draft.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                draft: RwLock::new(ThresholdSettings::default()),
                status: RwLock::new(None),
                status_epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Fetch the server copy into the draft.
    ///
    /// Absent bounds arrive as explicit unset values and a missing
    /// `alerts_enabled` defaults to enabled; both are handled at the wire
    /// boundary so the draft never conflates "unset" with zero.
    pub async fn load(&self) -> Result<ThresholdSettings> {
        match self.inner.gateway.thresholds().await {
            Ok(settings) => {
                debug!("loaded threshold settings");
                *self.inner.draft.write().await = settings.clone();
                self.inner.set_status(None).await;
                Ok(settings)
            }
            Err(e) => {
                warn!(error = %e, "failed to load threshold settings");
                self.inner
                    .set_status(Some(SettingsStatus::Failed(e.to_string())))
                    .await;
                Err(e)
            }
        }
    }

    /// Current draft.
    pub async fn draft(&self) -> ThresholdSettings {
        self.inner.draft.read().await.clone()
    }

    /// Edit one bound of the draft. `None` clears the bound.
    pub async fn set_bound(&self, metric: Metric, kind: BoundKind, value: Option<f64>) {
        self.inner.draft.write().await.set_bound(metric, kind, value);
    }

    /// Edit the alerts-enabled flag of the draft.
    pub async fn set_alerts_enabled(&self, enabled: bool) {
        self.inner.draft.write().await.alerts_enabled = enabled;
    }

    /// Submit the draft to the backend.
    ///
    /// Unset bounds are serialized as explicit nulls, never omitted. On
    /// failure the draft is left untouched for retry; on success a `Saved`
    /// status is surfaced and self-clears after 3 seconds.
    pub async fn save(&self) -> Result<()> {
        let draft = self.inner.draft.read().await.clone();
        match self.inner.gateway.update_thresholds(&draft).await {
            Ok(()) => {
                debug!("saved threshold settings");
                let epoch = self.inner.set_status(Some(SettingsStatus::Saved)).await;
                self.inner.schedule_status_clear(epoch);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to save threshold settings");
                self.inner
                    .set_status(Some(SettingsStatus::Failed(e.to_string())))
                    .await;
                Err(e)
            }
        }
    }

    /// Discard in-progress edits: every bound unset, alerts enabled.
    ///
    /// Purely local; no network call is issued.
    pub async fn reset(&self) {
        *self.inner.draft.write().await = ThresholdSettings::default();
        self.inner.set_status(None).await;
    }

    /// Current operator-visible status, if any.
    pub async fn status(&self) -> Option<SettingsStatus> {
        self.inner.status.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;

    fn sparse_settings() -> ThresholdSettings {
        ThresholdSettings {
            temperature_min: Some(15.0),
            temperature_max: Some(35.0),
            soil_moisture_min: Some(30.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_then_save_round_trips_unset_bounds() {
        let mock = Arc::new(MockGateway::new());
        mock.set_thresholds(sparse_settings()).await;

        let manager = ThresholdManager::new(Arc::clone(&mock) as Arc<dyn Gateway>);
        manager.load().await.unwrap();
        manager.save().await.unwrap();

        let saved = mock.last_saved_thresholds().await.unwrap();
        assert_eq!(saved, sparse_settings());
        assert_eq!(saved.humidity_min, None);
        assert!(saved.alerts_enabled);
    }

    #[tokio::test]
    async fn test_edits_flow_into_save() {
        let mock = Arc::new(MockGateway::new());
        let manager = ThresholdManager::new(Arc::clone(&mock) as Arc<dyn Gateway>);

        manager.set_bound(Metric::Humidity, BoundKind::Max, Some(80.0)).await;
        manager.set_alerts_enabled(false).await;
        manager.save().await.unwrap();

        let saved = mock.last_saved_thresholds().await.unwrap();
        assert_eq!(saved.humidity_max, Some(80.0));
        assert!(!saved.alerts_enabled);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_draft_for_retry() {
        let mock = Arc::new(MockGateway::new());
        let manager = ThresholdManager::new(Arc::clone(&mock) as Arc<dyn Gateway>);

        manager.set_bound(Metric::Temperature, BoundKind::Min, Some(10.0)).await;
        mock.fail_with("backend down").await;
        assert!(manager.save().await.is_err());

        assert_eq!(
            manager.draft().await.bound(Metric::Temperature, BoundKind::Min),
            Some(10.0)
        );
        assert!(matches!(
            manager.status().await,
            Some(SettingsStatus::Failed(_))
        ));

        mock.succeed().await;
        manager.save().await.unwrap();
        assert_eq!(
            mock.last_saved_thresholds().await.unwrap().temperature_min,
            Some(10.0)
        );
    }

    #[tokio::test]
    async fn test_reset_clears_everything_without_network() {
        let mock = Arc::new(MockGateway::new());
        mock.set_thresholds(sparse_settings()).await;

        let manager = ThresholdManager::new(Arc::clone(&mock) as Arc<dyn Gateway>);
        manager.load().await.unwrap();
        manager.set_alerts_enabled(false).await;

        let calls_before = mock.threshold_calls();
        manager.reset().await;

        assert_eq!(manager.draft().await, ThresholdSettings::default());
        assert!(manager.draft().await.alerts_enabled);
        assert_eq!(mock.threshold_calls(), calls_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_status_clears_after_three_seconds() {
        let mock = Arc::new(MockGateway::new());
        let manager = ThresholdManager::new(Arc::clone(&mock) as Arc<dyn Gateway>);

        manager.save().await.unwrap();
        assert_eq!(manager.status().await, Some(SettingsStatus::Saved));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(manager.status().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_status_supersedes_pending_clear() {
        let mock = Arc::new(MockGateway::new());
        let manager = ThresholdManager::new(Arc::clone(&mock) as Arc<dyn Gateway>);

        manager.save().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;

        // Second save restarts the clock; the first clear timer must not
        // wipe the fresh status.
        manager.save().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(manager.status().await, Some(SettingsStatus::Saved));

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(manager.status().await, None);
    }
}
