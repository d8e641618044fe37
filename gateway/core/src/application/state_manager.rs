// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! State Manager - the gateway's single entry point for a host application
//!
//! Responsibilities:
//! 1. Open one connection to the verification server and keep its receive
//!    loop running.
//! 2. Expose the gate flags the verifier pushes (`Agent_Control`,
//!    `Action_Verified`) and the decision they imply.
//! 3. Send predicate definitions and state updates, tagged with the
//!    application identity as `appName`.
//!
//! Calls made before `connect` or after `close` never fail: they log a
//! warning and return [`SendStatus::Skipped`]. Only transport failures are
//! returned as errors.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::application::interceptor::{Interceptor, Payload, StateReporter};
use crate::domain::event_shape::EventShape;
use crate::domain::events::GatewayEvent;
use crate::domain::gate::{decide, Decision, GateSnapshot, GateState, Lifecycle};
use crate::domain::gateway_config::GatewayConfigManifest;
use crate::domain::predicate::{PredicateDefinition, StateUpdate};
use crate::domain::protocol::{encode_frame, OutboundMessage};
use crate::error::{GatewayError, GatewayResult};
use crate::infrastructure::connection::{Connection, SendStatus};
use crate::infrastructure::event_bus::EventBus;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct StateManager {
    app_name: String,
    gate: Arc<GateState>,
    connection: OnceLock<Connection>,
    /// Held for the whole of `connect` so only one caller opens a socket
    connecting: tokio::sync::Mutex<()>,
    events: EventBus,
    connect_timeout: Duration,
}

impl StateManager {
    /// `app_name` is used verbatim as the `appName` of every outbound message.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            gate: Arc::new(GateState::new()),
            connection: OnceLock::new(),
            connecting: tokio::sync::Mutex::new(()),
            events: EventBus::with_default_capacity(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn from_config(config: &GatewayConfigManifest) -> Self {
        Self::new(config.spec.app.id.clone())
            .with_connect_timeout(config.spec.verifier.connect_timeout())
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Share an existing bus instead of the manager's own.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Read-only view of the gate flags.
    pub fn gate_state(&self) -> &GateState {
        &self.gate
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.connection
            .get()
            .map_or(Lifecycle::Unconnected, Connection::lifecycle)
    }

    pub fn is_agent_control_active(&self) -> bool {
        self.gate.agent_control()
    }

    pub fn is_verified_action_active(&self) -> bool {
        self.gate.verified_action()
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot::capture(&self.gate, self.lifecycle())
    }

    pub fn decide(&self) -> Decision {
        decide(&self.snapshot())
    }

    /// Connect to the verification server and start listening for control
    /// frames. A manager connects at most once.
    pub async fn connect(&self, host: &str, port: u16) -> GatewayResult<()> {
        let _connecting = self.connecting.lock().await;
        if let Some(existing) = self.connection.get() {
            return Err(GatewayError::AlreadyConnected(existing.lifecycle()));
        }

        let connection = Connection::open(
            host,
            port,
            self.connect_timeout,
            self.gate.clone(),
            self.events.clone(),
        )
        .await?;

        if let Err(duplicate) = self.connection.set(connection) {
            // Unreachable while `connecting` is held
            duplicate.close().await;
            return Err(GatewayError::AlreadyConnected(Lifecycle::Connected));
        }

        info!(host = %host, port = port, app_name = %self.app_name, "Connected to server");
        Ok(())
    }

    /// Serialize `message` as one line and write it.
    pub async fn send(&self, message: &OutboundMessage) -> GatewayResult<SendStatus> {
        let Some(connection) = self.connection.get() else {
            warn!(kind = message.kind(), "Socket is not connected. Cannot send data.");
            return Ok(SendStatus::Skipped);
        };

        let line = encode_frame(message)?;
        let status = connection.send_line(&line).await?;
        if status.is_sent() {
            debug!(kind = message.kind(), frame = %line.trim_end(), "Sent JSON");
        }
        Ok(status)
    }

    /// Send predicate definitions. Definitions breaking authoring
    /// conventions are still sent; the verifier has the final say.
    pub async fn define_state(
        &self,
        definitions: Vec<PredicateDefinition>,
    ) -> GatewayResult<SendStatus> {
        if definitions.is_empty() {
            warn!("defineState called with no definitions");
            return Ok(SendStatus::Skipped);
        }

        for definition in &definitions {
            if let Err(e) = definition.validate() {
                warn!(predicate = %definition.name, error = %e, "Predicate definition breaks conventions");
            }
        }

        let count = definitions.len();
        let message = OutboundMessage::define_state(self.app_name.clone(), definitions);
        let status = self.send(&message).await?;
        if status.is_sent() {
            self.events.publish(GatewayEvent::states_defined(count));
        }
        Ok(status)
    }

    /// Report current state for verification. An empty list is still sent
    /// as `"updates":[]` so a suppressed firing always reaches the verifier.
    pub async fn update_state(&self, updates: Vec<StateUpdate>) -> GatewayResult<SendStatus> {
        if updates.is_empty() {
            debug!("updateState called with no updates");
        }

        let count = updates.len();
        let message = OutboundMessage::update_state(self.app_name.clone(), updates);
        let status = self.send(&message).await?;
        if status.is_sent() {
            self.events.publish(GatewayEvent::states_reported(count));
        }
        Ok(status)
    }

    /// Close the connection. Safe to call any number of times, connected
    /// or not.
    pub async fn close(&self) {
        match self.connection.get() {
            Some(connection) => connection.close().await,
            None => debug!("close() called before connect; nothing to release"),
        }
    }

    /// An interceptor reporting `payload` through this manager.
    pub fn interceptor(self: &Arc<Self>, payload: impl Into<Payload>) -> Interceptor<StateManager> {
        Interceptor::new(self.clone(), payload)
    }
}

#[async_trait]
impl StateReporter for StateManager {
    fn gate(&self) -> GateSnapshot {
        self.snapshot()
    }

    async fn report(&self, updates: Vec<StateUpdate>) -> GatewayResult<SendStatus> {
        self.update_state(updates).await
    }

    fn record_decision(&self, decision: Decision, shape: EventShape) {
        debug!(decision = %decision, shape = %shape, app_name = %self.app_name, "Gate decision");
        self.events
            .publish(GatewayEvent::decision_made(decision, shape));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::predicate::{Variable, VariableType};

    #[tokio::test]
    async fn test_calls_before_connect_are_skipped() {
        let manager = StateManager::new("com.example.app");
        assert_eq!(manager.lifecycle(), Lifecycle::Unconnected);

        let defined = manager
            .define_state(vec![PredicateDefinition::new("Post", "")
                .with_variable(Variable::new("id", VariableType::Text).key())])
            .await
            .unwrap();
        assert_eq!(defined, SendStatus::Skipped);

        let updated = manager
            .update_state(vec![StateUpdate::new("Post").with_field("id", "1")])
            .await
            .unwrap();
        assert_eq!(updated, SendStatus::Skipped);
    }

    #[test]
    fn test_empty_lists_before_connect_are_skipped() {
        let manager = StateManager::new("app");
        let defined = tokio_test::block_on(manager.define_state(vec![])).unwrap();
        let updated = tokio_test::block_on(manager.update_state(vec![])).unwrap();
        assert_eq!(defined, SendStatus::Skipped);
        assert_eq!(updated, SendStatus::Skipped);
    }

    #[tokio::test]
    async fn test_close_before_connect_is_noop() {
        let manager = StateManager::new("app");
        manager.close().await;
        manager.close().await;
        assert_eq!(manager.lifecycle(), Lifecycle::Unconnected);
        assert_eq!(manager.decide(), Decision::Allow);
    }

    #[test]
    fn test_from_config_uses_app_id_and_timeout() {
        let mut config = GatewayConfigManifest::default();
        config.spec.app.id = "com.example.blog".to_string();
        config.spec.verifier.connect_timeout_ms = 250;

        let manager = StateManager::from_config(&config);
        assert_eq!(manager.app_name(), "com.example.blog");
        assert_eq!(manager.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_fresh_manager_allows() {
        let manager = StateManager::new("app");
        assert!(!manager.is_agent_control_active());
        assert!(!manager.is_verified_action_active());
        assert_eq!(manager.decide(), Decision::Allow);
    }
}
