//! Optimistic actuator command dispatch.
//!
//! [`ActuatorDispatcher::toggle`] is a two-phase operation keyed by channel
//! identity: the local desired state is flipped synchronously before the
//! network round-trip (the optimistic write), then the "set state" request
//! is issued. On success the state stays; on failure the pre-toggle value is
//! restored (the compensating rollback) and the error is returned.
//!
//! Concurrency policy: at most one outstanding command per channel. A second
//! toggle on a channel whose command has not resolved is rejected with
//! [`Error::CommandInFlight`] instead of inheriting the undefined
//! last-completion race of recurring-timer UIs. Commands on different
//! channels proceed independently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use farmlink_types::ActuatorChannel;

use crate::error::{Error, Result};
use crate::gateway::Gateway;

/// Owns the desired state of every actuator channel.
///
/// Desired state equals server-confirmed state except during the brief
/// window between an optimistic write and its acknowledgment or rollback.
pub struct ActuatorDispatcher {
    gateway: Arc<dyn Gateway>,
    channels: RwLock<HashMap<ActuatorChannel, bool>>,
    in_flight: StdMutex<HashSet<ActuatorChannel>>,
}

impl ActuatorDispatcher {
    /// Create a dispatcher with every known channel off.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let channels = ActuatorChannel::KNOWN
            .iter()
            .map(|&channel| (channel, false))
            .collect();
        Self {
            gateway,
            channels: RwLock::new(channels),
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    /// Desired state of a channel.
    pub async fn state(&self, channel: ActuatorChannel) -> bool {
        self.channels
            .read()
            .await
            .get(&channel)
            .copied()
            .unwrap_or(false)
    }

    /// Desired state of every known channel.
    pub async fn states(&self) -> HashMap<ActuatorChannel, bool> {
        self.channels.read().await.clone()
    }

    /// Whether a command is currently outstanding for a channel.
    pub fn is_in_flight(&self, channel: ActuatorChannel) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(&channel))
            .unwrap_or(false)
    }

    /// Toggle a channel to `next`, optimistically.
    ///
    /// The local desired state changes before the request is sent, so a
    /// subscriber sees the new state immediately. A transport failure rolls
    /// the state back to its pre-toggle value and is returned to the caller.
    pub async fn toggle(&self, channel: ActuatorChannel, next: bool) -> Result<()> {
        {
            let Ok(mut in_flight) = self.in_flight.lock() else {
                return Err(Error::CommandInFlight(channel));
            };
            if !in_flight.insert(channel) {
                return Err(Error::CommandInFlight(channel));
            }
        }

        // Phase 1: optimistic write, visible before network confirmation.
        let previous = {
            let mut channels = self.channels.write().await;
            let slot = channels.entry(channel).or_insert(false);
            let previous = *slot;
            *slot = next;
            previous
        };
        debug!(%channel, next, "dispatching actuator command");

        // Phase 2: confirm or compensate.
        let result = self.gateway.set_actuator(channel, next).await;
        if let Err(e) = &result {
            warn!(%channel, error = %e, "command failed, rolling back");
            let mut channels = self.channels.write().await;
            channels.insert(channel, previous);
        }

        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&channel);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use farmlink_types::{ChannelKind, DeviceId};
    use std::time::Duration;

    const PUMP: ActuatorChannel = ActuatorChannel::new(DeviceId::Master, ChannelKind::Pump);
    const LED: ActuatorChannel = ActuatorChannel::new(DeviceId::Slave2, ChannelKind::Led);

    #[tokio::test]
    async fn test_successful_toggle_keeps_new_state() {
        let mock = Arc::new(MockGateway::new());
        let dispatcher = ActuatorDispatcher::new(Arc::clone(&mock) as Arc<dyn Gateway>);

        dispatcher.toggle(PUMP, true).await.unwrap();
        assert!(dispatcher.state(PUMP).await);
        assert_eq!(mock.actuator_log().await, vec![(PUMP, true)]);
    }

    #[tokio::test]
    async fn test_failed_toggle_rolls_back() {
        let mock = Arc::new(MockGateway::new());
        let dispatcher = ActuatorDispatcher::new(Arc::clone(&mock) as Arc<dyn Gateway>);

        mock.fail_with("relay offline").await;
        let result = dispatcher.toggle(PUMP, true).await;
        assert!(result.is_err());
        assert!(!dispatcher.state(PUMP).await);
    }

    #[tokio::test]
    async fn test_rollback_restores_pre_toggle_value() {
        let mock = Arc::new(MockGateway::new());
        let dispatcher = ActuatorDispatcher::new(Arc::clone(&mock) as Arc<dyn Gateway>);

        dispatcher.toggle(PUMP, true).await.unwrap();
        mock.fail_with("relay offline").await;
        assert!(dispatcher.toggle(PUMP, false).await.is_err());
        // Rolled back to the confirmed ON state, not to the default.
        assert!(dispatcher.state(PUMP).await);
    }

    #[tokio::test]
    async fn test_second_toggle_while_outstanding_is_rejected() {
        let mock = Arc::new(MockGateway::new());
        mock.set_latency(Duration::from_millis(50));
        let dispatcher =
            Arc::new(ActuatorDispatcher::new(Arc::clone(&mock) as Arc<dyn Gateway>));

        let first = {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.toggle(PUMP, true).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(dispatcher.is_in_flight(PUMP));
        let second = dispatcher.toggle(PUMP, false).await;
        assert!(matches!(second, Err(Error::CommandInFlight(c)) if c == PUMP));

        first.await.unwrap().unwrap();
        assert!(dispatcher.state(PUMP).await);
        assert!(!dispatcher.is_in_flight(PUMP));
    }

    #[tokio::test]
    async fn test_channels_toggle_independently() {
        let mock = Arc::new(MockGateway::new());
        let dispatcher = ActuatorDispatcher::new(Arc::clone(&mock) as Arc<dyn Gateway>);

        dispatcher.toggle(PUMP, true).await.unwrap();
        dispatcher.toggle(LED, true).await.unwrap();
        dispatcher.toggle(PUMP, false).await.unwrap();

        let states = dispatcher.states().await;
        assert!(!states[&PUMP]);
        assert!(states[&LED]);
    }

    #[tokio::test]
    async fn test_all_known_channels_start_off() {
        let mock = Arc::new(MockGateway::new());
        let dispatcher = ActuatorDispatcher::new(mock as Arc<dyn Gateway>);
        let states = dispatcher.states().await;
        assert_eq!(states.len(), ActuatorChannel::KNOWN.len());
        assert!(states.values().all(|&on| !on));
    }
}
