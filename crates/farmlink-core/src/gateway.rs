//! HTTP client for the farm backend REST API.
//!
//! The engine talks to the backend exclusively through the [`Gateway`] trait,
//! which abstracts the remote collaborator so pollers and the command
//! dispatcher can be driven against [`crate::mock::MockGateway`] in tests.
//! [`GatewayClient`] is the production implementation backed by `reqwest`.
//!
//! # Example
//!
//! ```no_run
//! use farmlink_core::gateway::{Gateway, GatewayClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GatewayClient::new("http://localhost:8000")?;
//! let readings = client.latest_telemetry().await?;
//! println!("temperature: {:?}", readings.temperature);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use farmlink_types::{
    ActuatorChannel, Alert, Metric, ScheduleRequest, TelemetryReadings, ThresholdSettings,
    TrendPoint,
};

use crate::error::{Error, Result};

/// Default request timeout for gateway calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ==========================================================================
// Gateway trait
// ==========================================================================

/// Server-side aggregation applied to a history query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregation {
    #[default]
    Avg,
    Min,
    Max,
}

impl Aggregation {
    /// Wire name of the aggregation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Avg => "AVG",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
        }
    }
}

/// Parameters for a bucketed history query.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    /// Window start (inclusive).
    pub start: OffsetDateTime,
    /// Window end (inclusive).
    pub end: OffsetDateTime,
    /// Aggregation applied per bucket.
    pub aggregation: Aggregation,
    /// Bucket width.
    pub interval: Duration,
}

/// The remote gateway collaborator.
///
/// One method per backend operation; implementations must be safe to share
/// behind an `Arc` across the independent polling loops.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Fetch the latest sensor readings for the master device.
    async fn latest_telemetry(&self) -> Result<TelemetryReadings>;

    /// Fetch a bucketed aggregate series for all four metrics.
    ///
    /// Metrics missing from the response are simply absent from the map.
    async fn telemetry_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<HashMap<Metric, Vec<TrendPoint>>>;

    /// Set the state of a binary actuator channel.
    async fn set_actuator(&self, channel: ActuatorChannel, state: bool) -> Result<()>;

    /// Submit a validated irrigation schedule.
    async fn create_schedule(&self, request: &ScheduleRequest) -> Result<()>;

    /// Fetch the current threshold settings.
    async fn thresholds(&self) -> Result<ThresholdSettings>;

    /// Replace the threshold settings.
    async fn update_thresholds(&self, settings: &ThresholdSettings) -> Result<()>;

    /// Fetch the active alert list.
    async fn alerts(&self) -> Result<Vec<Alert>>;

    /// Clear all active alerts.
    async fn clear_alerts(&self) -> Result<()>;
}

// ==========================================================================
// Wire types
// ==========================================================================

/// `{success, data}` envelope used by the telemetry endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, treating an unsuccessful or empty envelope as a
    /// transport-level failure.
    fn into_data(self) -> Result<T> {
        match self {
            Envelope {
                success: true,
                data: Some(data),
            } => Ok(data),
            _ => Err(Error::MissingData),
        }
    }
}

/// Accept a reading that arrives as a JSON number, a numeric string, or
/// null. The backend is not consistent about which it sends.
fn numeric_or_null<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("non-numeric reading {s:?}"))),
        Some(other) => Err(D::Error::custom(format!(
            "expected number, string or null, got {other}"
        ))),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryData {
    #[serde(default, deserialize_with = "numeric_or_null")]
    temperature: Option<f64>,
    #[serde(default, deserialize_with = "numeric_or_null")]
    humidity: Option<f64>,
    #[serde(default, deserialize_with = "numeric_or_null")]
    soil_moisture: Option<f64>,
    #[serde(default, deserialize_with = "numeric_or_null")]
    light_level: Option<f64>,
}

impl From<TelemetryData> for TelemetryReadings {
    fn from(data: TelemetryData) -> Self {
        Self {
            temperature: data.temperature,
            humidity: data.humidity,
            soil_moisture: data.soil_moisture,
            light_level: data.light_level,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AlertsBody {
    #[serde(default)]
    alerts: Vec<Alert>,
}

#[derive(Debug, Serialize)]
struct SetStateBody {
    state: bool,
}

/// Comma-separated `keys` parameter for a history query, covering every
/// metric.
fn metric_keys() -> String {
    Metric::ALL.map(|m| m.key()).join(",")
}

// ==========================================================================
// GatewayClient
// ==========================================================================

/// Production [`Gateway`] implementation over HTTP.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a new gateway client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base address of the backend, e.g. `http://localhost:8000`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Self::with_client(base_url, client)
    }

    /// Create a client with a custom reqwest `Client`.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        // Normalize URL (remove trailing slash)
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidBaseUrl(format!(
                "URL must start with http:// or https://, got: {base_url}"
            )));
        }

        Ok(Self { client, base_url })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;
        Self::handle_response(response).await
    }

    async fn post_ack<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        Self::handle_ack(response).await
    }

    async fn delete_ack(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.delete(&url).send().await?;
        Self::handle_ack(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::api_error(status, response).await)
        }
    }

    async fn handle_ack(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::api_error(status, response).await)
        }
    }

    async fn api_error(status: reqwest::StatusCode, response: reqwest::Response) -> Error {
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.to_string());

        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn latest_telemetry(&self) -> Result<TelemetryReadings> {
        let envelope: Envelope<TelemetryData> = self
            .get_json("/api/devices/master/telemetry/latest", &[])
            .await?;
        Ok(envelope.into_data()?.into())
    }

    async fn telemetry_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<HashMap<Metric, Vec<TrendPoint>>> {
        let keys = metric_keys();
        let format_ts = |ts: OffsetDateTime| {
            ts.format(&Rfc3339)
                .map_err(|e| Error::InvalidConfig(format!("unformattable timestamp: {e}")))
        };
        let params = [
            ("keys", keys),
            ("start_time", format_ts(query.start)?),
            ("end_time", format_ts(query.end)?),
            ("agg", query.aggregation.as_str().to_string()),
            ("interval_ms", query.interval.as_millis().to_string()),
        ];

        let envelope: Envelope<HashMap<String, Vec<TrendPoint>>> = self
            .get_json("/api/devices/master/telemetry/history", &params)
            .await?;

        let mut series = HashMap::new();
        for (key, points) in envelope.into_data()? {
            match Metric::from_key(&key) {
                Some(metric) => {
                    series.insert(metric, points);
                }
                None => debug!(key, "ignoring unknown metric in history response"),
            }
        }
        Ok(series)
    }

    async fn set_actuator(&self, channel: ActuatorChannel, state: bool) -> Result<()> {
        let path = format!(
            "/api/devices/{}/{}",
            channel.device.as_str(),
            channel.kind.as_str()
        );
        self.post_ack(&path, &SetStateBody { state }).await
    }

    async fn create_schedule(&self, request: &ScheduleRequest) -> Result<()> {
        self.post_ack("/api/schedules", request).await
    }

    async fn thresholds(&self) -> Result<ThresholdSettings> {
        self.get_json("/api/settings/thresholds", &[]).await
    }

    async fn update_thresholds(&self, settings: &ThresholdSettings) -> Result<()> {
        self.post_ack("/api/settings/thresholds", settings).await
    }

    async fn alerts(&self) -> Result<Vec<Alert>> {
        let body: AlertsBody = self.get_json("/api/alerts", &[]).await?;
        Ok(body.alerts)
    }

    async fn clear_alerts(&self) -> Result<()> {
        self.delete_ack("/api/alerts").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GatewayClient::new("http://localhost:8000").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_client_normalizes_url() {
        let client = GatewayClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_client_invalid_url() {
        let result = GatewayClient::new("localhost:8000");
        assert!(matches!(result, Err(Error::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_envelope_unwraps_payload() {
        let envelope: Envelope<TelemetryData> =
            serde_json::from_str(r#"{"success":true,"data":{"temperature":21.0}}"#).unwrap();
        let readings: TelemetryReadings = envelope.into_data().unwrap().into();
        assert_eq!(readings.temperature, Some(21.0));
    }

    #[test]
    fn test_envelope_without_data_is_missing_payload() {
        let envelope: Envelope<TelemetryData> =
            serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(matches!(envelope.into_data(), Err(Error::MissingData)));
    }

    #[test]
    fn test_telemetry_values_accept_strings_and_nulls() {
        let data: TelemetryData = serde_json::from_str(
            r#"{"temperature":"23.456","humidity":null,"soilMoisture":40,"lightLevel":1200}"#,
        )
        .unwrap();
        assert_eq!(data.temperature, Some(23.456));
        assert_eq!(data.humidity, None);
        assert_eq!(data.soil_moisture, Some(40.0));
        assert_eq!(data.light_level, Some(1200.0));
    }

    #[test]
    fn test_telemetry_rejects_garbage_strings() {
        let result: std::result::Result<TelemetryData, _> =
            serde_json::from_str(r#"{"temperature":"warm"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_alerts_body_defaults_to_empty() {
        let body: AlertsBody = serde_json::from_str("{}").unwrap();
        assert!(body.alerts.is_empty());
    }

    #[test]
    fn test_history_keys_cover_every_metric() {
        assert_eq!(metric_keys(), "temperature,humidity,soilMoisture,lightLevel");
    }

    #[test]
    fn test_aggregation_wire_names() {
        assert_eq!(Aggregation::Avg.as_str(), "AVG");
        assert_eq!(Aggregation::Min.as_str(), "MIN");
        assert_eq!(Aggregation::Max.as_str(), "MAX");
    }
}
