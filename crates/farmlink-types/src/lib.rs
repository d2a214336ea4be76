//! Platform-agnostic types for the farmlink monitoring console.
//!
//! This crate provides the shared data model used by the synchronization
//! engine in `farmlink-core` and by any rendering front end that subscribes
//! to its state.
//!
//! # Contents
//!
//! - Sensor snapshots and the fixed [`Metric`] set with display precision
//! - Active alerts and their severities
//! - Actuator channel identities (the fixed device/channel pairs)
//! - Irrigation schedule payloads
//! - Sparse threshold settings with explicit null-vs-unset semantics
//! - Bucketed aggregate history points
//!
//! # Example
//!
//! ```
//! use farmlink_types::{Metric, SensorSnapshot, TelemetryReadings};
//! use time::OffsetDateTime;
//!
//! let raw = TelemetryReadings {
//!     temperature: Some(23.456),
//!     ..Default::default()
//! };
//! let snapshot = SensorSnapshot::from_readings(&raw, OffsetDateTime::UNIX_EPOCH);
//! assert_eq!(snapshot.display(Metric::Temperature).as_deref(), Some("23.5"));
//! ```

pub mod types;

pub use types::{
    ActuatorChannel, Alert, AlertSeverity, BoundKind, ChannelKind, DeviceId, Metric,
    ScheduleRequest, SensorSnapshot, TelemetryReadings, ThresholdSettings, TrendPoint,
};
