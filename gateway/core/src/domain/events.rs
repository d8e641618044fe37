// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::gate::{Decision, GateFlag};
use crate::domain::event_shape::EventShape;

/// Diagnostics emitted by the gateway. Published on the
/// [`EventBus`](crate::infrastructure::event_bus::EventBus); formatting and
/// sinks belong to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
    Connected {
        host: String,
        port: u16,
        connected_at: DateTime<Utc>,
    },
    Disconnected {
        reason: DisconnectReason,
        disconnected_at: DateTime<Utc>,
    },
    FrameRejected {
        frame: String,
        error: String,
        rejected_at: DateTime<Utc>,
    },
    GateChanged {
        flag: GateFlag,
        value: bool,
        changed_at: DateTime<Utc>,
    },
    DecisionMade {
        decision: Decision,
        shape: EventShape,
        decided_at: DateTime<Utc>,
    },
    StatesDefined {
        count: usize,
        sent_at: DateTime<Utc>,
    },
    StatesReported {
        count: usize,
        sent_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// `close()` was called locally
    Closed,
    /// The verifier ended the stream
    RemoteHangup,
    /// Reading from the stream failed
    ReadError,
}

impl GatewayEvent {
    pub fn connected(host: impl Into<String>, port: u16) -> Self {
        GatewayEvent::Connected {
            host: host.into(),
            port,
            connected_at: Utc::now(),
        }
    }

    pub fn disconnected(reason: DisconnectReason) -> Self {
        GatewayEvent::Disconnected {
            reason,
            disconnected_at: Utc::now(),
        }
    }

    pub fn frame_rejected(frame: impl Into<String>, error: impl ToString) -> Self {
        GatewayEvent::FrameRejected {
            frame: frame.into(),
            error: error.to_string(),
            rejected_at: Utc::now(),
        }
    }

    pub fn gate_changed(flag: GateFlag, value: bool) -> Self {
        GatewayEvent::GateChanged {
            flag,
            value,
            changed_at: Utc::now(),
        }
    }

    pub fn decision_made(decision: Decision, shape: EventShape) -> Self {
        GatewayEvent::DecisionMade {
            decision,
            shape,
            decided_at: Utc::now(),
        }
    }

    pub fn states_defined(count: usize) -> Self {
        GatewayEvent::StatesDefined {
            count,
            sent_at: Utc::now(),
        }
    }

    pub fn states_reported(count: usize) -> Self {
        GatewayEvent::StatesReported {
            count,
            sent_at: Utc::now(),
        }
    }

    /// Short event name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            GatewayEvent::Connected { .. } => "connected",
            GatewayEvent::Disconnected { .. } => "disconnected",
            GatewayEvent::FrameRejected { .. } => "frame_rejected",
            GatewayEvent::GateChanged { .. } => "gate_changed",
            GatewayEvent::DecisionMade { .. } => "decision_made",
            GatewayEvent::StatesDefined { .. } => "states_defined",
            GatewayEvent::StatesReported { .. } => "states_reported",
        }
    }
}
