//! Error types for farmlink-core.
//!
//! The engine distinguishes three failure classes:
//!
//! - **Transport failures** ([`Error::Http`], [`Error::Api`],
//!   [`Error::MissingData`]): the gateway could not be reached or returned
//!   an error. Pollers treat these as fail-soft (previous data is retained);
//!   actuator commands roll back their optimistic write.
//! - **Validation failures** ([`Error::Schedule`]): malformed operator
//!   input detected locally. These never reach the network.
//! - **Local policy errors** ([`Error::CommandInFlight`],
//!   [`Error::InvalidConfig`]): the caller asked for something the engine
//!   refuses to do.
//!
//! Nothing here is retried automatically; the next scheduled poll tick is
//! the only retry mechanism.

use thiserror::Error;

use farmlink_types::ActuatorChannel;

use crate::schedule::ScheduleError;

/// Errors that can occur in the synchronization engine.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// HTTP transport error from the gateway.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("Gateway error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body, or the status text.
        message: String,
    },

    /// The gateway answered 2xx but the envelope carried no usable payload.
    #[error("Gateway response missing payload")]
    MissingData,

    /// Invalid gateway base URL.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Operator-entered schedule fields failed validation.
    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    /// A toggle was issued for a channel that already has a command
    /// outstanding.
    #[error("Command already in flight for channel {0}")]
    CommandInFlight(ActuatorChannel),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error (preference store, config file).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Preference store failure.
    #[error("Preference store error: {0}")]
    Preferences(String),
}

impl Error {
    /// Whether this error came from the transport/gateway rather than from
    /// local validation or policy.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Api { .. } | Error::MissingData)
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use farmlink_types::{ChannelKind, DeviceId};

    #[test]
    fn test_transport_classification() {
        let api = Error::Api {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert!(api.is_transport());
        assert!(Error::MissingData.is_transport());

        let in_flight = Error::CommandInFlight(ActuatorChannel::new(
            DeviceId::Master,
            ChannelKind::Pump,
        ));
        assert!(!in_flight.is_transport());
    }

    #[test]
    fn test_error_messages_name_the_channel() {
        let err = Error::CommandInFlight(ActuatorChannel::new(DeviceId::Slave1, ChannelKind::Pump));
        assert!(err.to_string().contains("slave1/pump"));
    }
}
