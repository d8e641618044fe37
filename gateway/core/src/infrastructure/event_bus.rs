// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Gateway Diagnostics
//
// Provides in-memory event streaming using tokio broadcast channels.
// Hosts subscribe to render connection, frame and decision events however
// they like. Events are not persisted.

use crate::domain::events::{DisconnectReason, GatewayEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to gateway events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<GatewayEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (256)
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish an event to all subscribers. Never blocks.
    pub fn publish(&self, event: GatewayEvent) {
        debug!(event = event.name(), "Publishing gateway event");

        // send() only fails when nobody is subscribed
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all gateway events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for gateway events
pub struct EventReceiver {
    receiver: broadcast::Receiver<GatewayEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<GatewayEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<GatewayEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Wait for the first event matching `predicate`, skipping the rest.
    /// Lagged receivers keep waiting; a closed bus ends the wait.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Result<GatewayEvent, EventBusError>
    where
        F: FnMut(&GatewayEvent) -> bool,
    {
        loop {
            match self.recv().await {
                Ok(event) if predicate(&event) => return Ok(event),
                Ok(_) | Err(EventBusError::Lagged(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait until the connection reports it is gone.
    pub async fn wait_for_disconnect(&mut self) -> Result<DisconnectReason, EventBusError> {
        match self
            .wait_for(|e| matches!(e, GatewayEvent::Disconnected { .. }))
            .await?
        {
            GatewayEvent::Disconnected { reason, .. } => Ok(reason),
            _ => Err(EventBusError::Closed),
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gate::GateFlag;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(GatewayEvent::gate_changed(GateFlag::AgentControl, true));

        match receiver.recv().await.unwrap() {
            GatewayEvent::GateChanged { flag, value, .. } => {
                assert_eq!(flag, GateFlag::AgentControl);
                assert!(value);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wait_for_skips_unrelated_events() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(GatewayEvent::connected("127.0.0.1", 7070));
        event_bus.publish(GatewayEvent::states_reported(1));
        event_bus.publish(GatewayEvent::disconnected(DisconnectReason::RemoteHangup));

        let reason = receiver.wait_for_disconnect().await.unwrap();
        assert_eq!(reason, DisconnectReason::RemoteHangup);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let event_bus = EventBus::default();
        assert_eq!(event_bus.subscriber_count(), 0);
        event_bus.publish(GatewayEvent::states_defined(2));

        let mut late = event_bus.subscribe();
        assert!(matches!(late.try_recv(), Err(EventBusError::Empty)));
    }
}
