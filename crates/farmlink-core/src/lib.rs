//! Client-side sync engine for a smart-farm monitoring console.
//!
//! This crate keeps a local view of a farm backend in step with the server:
//! periodic telemetry and alert polling, on-demand history aggregation,
//! optimistic actuator commands with rollback, irrigation schedule
//! validation, and sparse threshold settings management. All network access
//! goes through the [`gateway::Gateway`] trait; [`mock::MockGateway`]
//! drives the whole engine in tests without a backend.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use farmlink_core::config::ConsoleConfig;
//! use farmlink_core::console::Console;
//! use farmlink_core::prefs::FilePreferences;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConsoleConfig::load("console.toml")?;
//! let prefs = Arc::new(FilePreferences::default_location()?);
//! let console = Console::new(config, prefs)?;
//!
//! console.start();
//! let view = console.telemetry().view().await;
//! println!("snapshot: {:?}", view.snapshot);
//! # Ok(())
//! # }
//! ```

pub mod actuators;
pub mod alerts;
pub mod config;
pub mod console;
pub mod error;
pub mod gateway;
pub mod history;
pub mod mock;
pub mod prefs;
pub mod schedule;
pub mod settings;
pub mod telemetry;

pub use actuators::ActuatorDispatcher;
pub use alerts::{AlertPoller, AlertView};
pub use config::ConsoleConfig;
pub use console::Console;
pub use error::{Error, Result};
pub use gateway::{Aggregation, Gateway, GatewayClient, HistoryQuery};
pub use history::{HistoryLoader, HistoryOptions, HistoryView};
pub use prefs::{FilePreferences, MemoryPreferences, PreferenceStore, Theme};
pub use schedule::{ScheduleError, ScheduleField, ScheduleFields, build_schedule};
pub use settings::{SettingsStatus, ThresholdManager};
pub use telemetry::{TelemetryPoller, TelemetryView};
