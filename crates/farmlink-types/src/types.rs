//! Core data types for the farmlink console.
//!
//! Everything here is plain data: snapshots, alerts, actuator channel
//! identities, schedule payloads, threshold settings, and history points.
//! Ownership and mutation rules live in `farmlink-core`; these types only
//! describe the shapes that cross the gateway boundary or are handed to a
//! rendering collaborator.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// ==========================================================================
// Metrics
// ==========================================================================

/// The four sensor metrics reported by the farm backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Air temperature in °C.
    Temperature,
    /// Relative air humidity in %.
    Humidity,
    /// Soil moisture in %.
    SoilMoisture,
    /// Ambient light level in lux.
    LightLevel,
}

impl Metric {
    /// All metrics, in display order.
    pub const ALL: [Metric; 4] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::SoilMoisture,
        Metric::LightLevel,
    ];

    /// The wire key used by the backend for this metric.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::SoilMoisture => "soilMoisture",
            Metric::LightLevel => "lightLevel",
        }
    }

    /// Parse a wire key back into a metric.
    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.key() == key)
    }

    /// Number of decimal places retained for this metric.
    ///
    /// Temperature, humidity and soil moisture keep one decimal; light level
    /// is an integer lux count.
    pub fn decimals(&self) -> u32 {
        match self {
            Metric::LightLevel => 0,
            _ => 1,
        }
    }

    /// Round a raw reading to this metric's precision.
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.decimals() as i32);
        (value * factor).round() / factor
    }

    /// Format an already-rounded value with this metric's fixed precision.
    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.decimals() as usize, value)
    }

    /// Display unit for this metric.
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity | Metric::SoilMoisture => "%",
            Metric::LightLevel => "lux",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ==========================================================================
// Telemetry
// ==========================================================================

/// Raw sensor values as returned by the gateway, before rounding.
///
/// Any field may be null when the corresponding sensor has not reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReadings {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub light_level: Option<f64>,
}

impl TelemetryReadings {
    /// Get the raw value for a metric.
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::SoilMoisture => self.soil_moisture,
            Metric::LightLevel => self.light_level,
        }
    }
}

/// The most recently completed full read of sensor values.
///
/// A snapshot is immutable once produced and is replaced wholesale on each
/// successful poll; it is never merged field-by-field with a previous one.
/// Values are stored already rounded to their metric's display precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub light_level: Option<f64>,
    /// When the poll producing this snapshot completed.
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}

impl SensorSnapshot {
    /// Build a snapshot from raw readings, rounding each value to its
    /// metric's precision.
    pub fn from_readings(readings: &TelemetryReadings, captured_at: OffsetDateTime) -> Self {
        let rounded = |m: Metric| readings.value(m).map(|v| m.round(v));
        Self {
            temperature: rounded(Metric::Temperature),
            humidity: rounded(Metric::Humidity),
            soil_moisture: rounded(Metric::SoilMoisture),
            light_level: rounded(Metric::LightLevel),
            captured_at,
        }
    }

    /// Get the stored (rounded) value for a metric.
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::SoilMoisture => self.soil_moisture,
            Metric::LightLevel => self.light_level,
        }
    }

    /// Fixed-precision display string for a metric, or `None` when the
    /// sensor has no reading.
    pub fn display(&self, metric: Metric) -> Option<String> {
        self.value(metric).map(|v| metric.format(v))
    }
}

// ==========================================================================
// Alerts
// ==========================================================================

/// Severity of an alert as classified by the backend.
///
/// Unknown severities deserialize to [`AlertSeverity::Other`] rather than
/// failing the whole alert list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Danger,
    Warning,
    Info,
    #[default]
    #[serde(other)]
    Other,
}

/// A single active alert.
///
/// Alerts are read-only from the client's perspective; the full set is
/// replaced wholesale on each poll with no client-side merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert identifier.
    pub id: String,
    /// Human-readable alert message.
    pub message: String,
    #[serde(default)]
    pub severity: AlertSeverity,
    /// Raw backend timestamp, passed through untouched for display.
    #[serde(default)]
    pub timestamp: String,
}

// ==========================================================================
// Actuator channels
// ==========================================================================

/// A device node in the farm installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceId {
    Master,
    Slave1,
    Slave2,
}

impl DeviceId {
    /// The wire name used in gateway paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceId::Master => "master",
            DeviceId::Slave1 => "slave1",
            DeviceId::Slave2 => "slave2",
        }
    }
}

/// Kind of binary actuator channel on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Relay,
    Pump,
    Led,
}

impl ChannelKind {
    /// The wire name used in gateway paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Relay => "relay",
            ChannelKind::Pump => "pump",
            ChannelKind::Led => "led",
        }
    }
}

/// Identity of a binary actuator channel: one switchable output on one
/// device.
///
/// The set of channels is fixed and known at build time ([`Self::KNOWN`]);
/// there is no dynamic discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActuatorChannel {
    pub device: DeviceId,
    pub kind: ChannelKind,
}

impl ActuatorChannel {
    /// Create a channel identity.
    pub const fn new(device: DeviceId, kind: ChannelKind) -> Self {
        Self { device, kind }
    }

    /// Every actuator channel in the installation.
    pub const KNOWN: [ActuatorChannel; 5] = [
        ActuatorChannel::new(DeviceId::Master, ChannelKind::Relay),
        ActuatorChannel::new(DeviceId::Master, ChannelKind::Pump),
        ActuatorChannel::new(DeviceId::Master, ChannelKind::Led),
        ActuatorChannel::new(DeviceId::Slave1, ChannelKind::Pump),
        ActuatorChannel::new(DeviceId::Slave2, ChannelKind::Led),
    ];
}

impl std::fmt::Display for ActuatorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device.as_str(), self.kind.as_str())
    }
}

// ==========================================================================
// Schedules
// ==========================================================================

/// A validated irrigation schedule, ready for submission.
///
/// Built once per submit attempt and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Absolute start instant as an ISO-8601 string with an explicit
    /// `+07:00` offset, e.g. `2025-06-01T06:30:00.000+07:00`.
    pub start_time: String,
    /// Requested watering duration in minutes.
    pub duration_minutes: f64,
    /// Whether the schedule repeats every day at the same wall-clock time.
    pub repeat_daily: bool,
}

// ==========================================================================
// Threshold settings
// ==========================================================================

/// Which side of a metric's alert band a bound belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundKind {
    Min,
    Max,
}

fn default_true() -> bool {
    true
}

/// Sparse alert-threshold configuration.
///
/// Every bound is optional; `None` means "no bound configured" and must
/// round-trip as an explicit JSON null, never as zero and never by omitting
/// the key. `alerts_enabled` defaults to `true` when absent in loaded data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSettings {
    #[serde(default)]
    pub temperature_min: Option<f64>,
    #[serde(default)]
    pub temperature_max: Option<f64>,
    #[serde(default)]
    pub humidity_min: Option<f64>,
    #[serde(default)]
    pub humidity_max: Option<f64>,
    #[serde(default)]
    pub soil_moisture_min: Option<f64>,
    #[serde(default)]
    pub soil_moisture_max: Option<f64>,
    #[serde(default)]
    pub light_level_min: Option<f64>,
    #[serde(default)]
    pub light_level_max: Option<f64>,
    #[serde(default = "default_true")]
    pub alerts_enabled: bool,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            temperature_min: None,
            temperature_max: None,
            humidity_min: None,
            humidity_max: None,
            soil_moisture_min: None,
            soil_moisture_max: None,
            light_level_min: None,
            light_level_max: None,
            alerts_enabled: true,
        }
    }
}

impl ThresholdSettings {
    /// Get a bound by metric and side.
    pub fn bound(&self, metric: Metric, kind: BoundKind) -> Option<f64> {
        match (metric, kind) {
            (Metric::Temperature, BoundKind::Min) => self.temperature_min,
            (Metric::Temperature, BoundKind::Max) => self.temperature_max,
            (Metric::Humidity, BoundKind::Min) => self.humidity_min,
            (Metric::Humidity, BoundKind::Max) => self.humidity_max,
            (Metric::SoilMoisture, BoundKind::Min) => self.soil_moisture_min,
            (Metric::SoilMoisture, BoundKind::Max) => self.soil_moisture_max,
            (Metric::LightLevel, BoundKind::Min) => self.light_level_min,
            (Metric::LightLevel, BoundKind::Max) => self.light_level_max,
        }
    }

    /// Set a bound by metric and side. `None` clears the bound.
    pub fn set_bound(&mut self, metric: Metric, kind: BoundKind, value: Option<f64>) {
        let slot = match (metric, kind) {
            (Metric::Temperature, BoundKind::Min) => &mut self.temperature_min,
            (Metric::Temperature, BoundKind::Max) => &mut self.temperature_max,
            (Metric::Humidity, BoundKind::Min) => &mut self.humidity_min,
            (Metric::Humidity, BoundKind::Max) => &mut self.humidity_max,
            (Metric::SoilMoisture, BoundKind::Min) => &mut self.soil_moisture_min,
            (Metric::SoilMoisture, BoundKind::Max) => &mut self.soil_moisture_max,
            (Metric::LightLevel, BoundKind::Min) => &mut self.light_level_min,
            (Metric::LightLevel, BoundKind::Max) => &mut self.light_level_max,
        };
        *slot = value;
    }
}

// ==========================================================================
// History
// ==========================================================================

/// One point of a bucketed aggregate series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Bucket timestamp in milliseconds since the Unix epoch.
    pub ts: i64,
    /// Aggregated value for the bucket.
    pub value: f64,
}
