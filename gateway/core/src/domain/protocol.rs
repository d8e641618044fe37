// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Verifier wire protocol.
//!
//! One JSON object per line in both directions.
//!
//! ```text
//! client -> verifier
//!   {"type":"defineState","appName":"...","state":[<PredicateDefinition>, ...]}
//!   {"type":"updateState","appName":"...","updates":[<StateUpdate>, ...]}
//!
//! verifier -> client
//!   {"Agent_Control": true|false}
//!   {"Action_Verified": true|false}
//! ```
//!
//! Outbound messages are fire-and-forget. Nothing ties an `updateState` to
//! the flag change it provokes; the verifier's reply is matched by timing
//! alone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::predicate::{PredicateDefinition, StateUpdate};

pub const AGENT_CONTROL_KEY: &str = "Agent_Control";
pub const ACTION_VERIFIED_KEY: &str = "Action_Verified";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame carries neither Agent_Control nor Action_Verified")]
    NoControlKey,
}

/// Client to verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "defineState")]
    DefineState {
        #[serde(rename = "appName")]
        app_name: String,
        state: Vec<PredicateDefinition>,
    },

    #[serde(rename = "updateState")]
    UpdateState {
        #[serde(rename = "appName")]
        app_name: String,
        updates: Vec<StateUpdate>,
    },
}

impl OutboundMessage {
    pub fn define_state(app_name: impl Into<String>, state: Vec<PredicateDefinition>) -> Self {
        OutboundMessage::DefineState {
            app_name: app_name.into(),
            state,
        }
    }

    pub fn update_state(app_name: impl Into<String>, updates: Vec<StateUpdate>) -> Self {
        OutboundMessage::UpdateState {
            app_name: app_name.into(),
            updates,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::DefineState { .. } => "defineState",
            OutboundMessage::UpdateState { .. } => "updateState",
        }
    }

    /// Number of definitions or updates carried.
    pub fn len(&self) -> usize {
        match self {
            OutboundMessage::DefineState { state, .. } => state.len(),
            OutboundMessage::UpdateState { updates, .. } => updates.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Verifier to client. Each frame carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    AgentControl(bool),
    ActionVerified(bool),
}

impl InboundMessage {
    pub fn to_frame(self) -> String {
        let (key, value) = match self {
            InboundMessage::AgentControl(v) => (AGENT_CONTROL_KEY, v),
            InboundMessage::ActionVerified(v) => (ACTION_VERIFIED_KEY, v),
        };
        let mut frame = serde_json::Map::new();
        frame.insert(key.to_string(), serde_json::Value::Bool(value));
        serde_json::Value::Object(frame).to_string()
    }
}

// Unknown keys are ignored so the verifier can extend frames. A control key
// that is present must hold a boolean; `null` rejects the whole frame.
#[derive(Deserialize)]
struct RawControlFrame {
    #[serde(rename = "Agent_Control", default, deserialize_with = "present_bool")]
    agent_control: Option<bool>,
    #[serde(rename = "Action_Verified", default, deserialize_with = "present_bool")]
    action_verified: Option<bool>,
}

fn present_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    bool::deserialize(deserializer).map(Some)
}

/// Encode an outbound message as one newline-terminated line.
pub fn encode_frame(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decode one inbound line. Surrounding whitespace is ignored.
///
/// A frame holding both keys yields `AgentControl`; the other key is dropped.
pub fn decode_frame(line: &str) -> Result<InboundMessage, ProtocolError> {
    let raw: RawControlFrame = serde_json::from_str(line.trim())?;
    match (raw.agent_control, raw.action_verified) {
        (Some(control), _) => Ok(InboundMessage::AgentControl(control)),
        (None, Some(verified)) => Ok(InboundMessage::ActionVerified(verified)),
        (None, None) => Err(ProtocolError::NoControlKey),
    }
}
