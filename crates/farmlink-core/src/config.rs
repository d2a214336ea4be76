//! Console configuration.
//!
//! [`ConsoleConfig`] carries the backend address and the polling cadences.
//! Every field has a production default, so an empty TOML file (or no file
//! at all) yields a working configuration pointed at a local backend.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_telemetry_ms() -> u64 {
    300_000
}

fn default_alert_ms() -> u64 {
    30_000
}

fn default_history_ms() -> u64 {
    300_000
}

/// Runtime configuration of the console engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Base address of the farm backend.
    pub base_url: String,
    /// Telemetry polling period in milliseconds.
    pub telemetry_interval_ms: u64,
    /// Alert polling period in milliseconds.
    pub alert_interval_ms: u64,
    /// History refresh period in milliseconds.
    pub history_interval_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            telemetry_interval_ms: default_telemetry_ms(),
            alert_interval_ms: default_alert_ms(),
            history_interval_ms: default_history_ms(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; a present but malformed file is
    /// an error, never a silent fallback.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config = Self::from_toml(&contents)?;
                debug!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::InvalidConfig(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telemetry_interval_ms == 0
            || self.alert_interval_ms == 0
            || self.history_interval_ms == 0
        {
            return Err(Error::InvalidConfig(
                "polling intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Telemetry polling period.
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }

    /// Alert polling period.
    pub fn alert_interval(&self) -> Duration {
        Duration::from_millis(self.alert_interval_ms)
    }

    /// History refresh period.
    pub fn history_interval(&self) -> Duration {
        Duration::from_millis(self.history_interval_ms)
    }
}
