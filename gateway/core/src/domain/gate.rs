// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gate State & Decision Engine
//!
//! The gate is the decision point between an application action and the
//! remote verifier. It holds two flags pushed by the verifier:
//!
//! - `agent_control`: an external agent currently drives the UI
//! - `verified_action`: the most recently reported state passed verification
//!
//! Both flags live in a single `AtomicU8` so a reader always observes a
//! consistent pair. Only the receive loop writes them (`GateState::apply` is
//! crate-private); any number of event sources read them lock-free.
//!
//! # Post-close policy
//!
//! Once the connection is [`Lifecycle::Closed`], [`decide`] fails open and
//! allows every action. Flags are left at their last value so diagnostics
//! still show what the verifier last said.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::domain::protocol::InboundMessage;

const AGENT_CONTROL: u8 = 0b01;
const VERIFIED_ACTION: u8 = 0b10;

/// Connection lifecycle as seen by the gate.
///
/// Transitions are one-way: `Unconnected -> Connected -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Unconnected,
    Connected,
    Closed,
}

impl Lifecycle {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Lifecycle::Unconnected => 0,
            Lifecycle::Connected => 1,
            Lifecycle::Closed => 2,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Lifecycle::Unconnected,
            1 => Lifecycle::Connected,
            _ => Lifecycle::Closed,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Unconnected => write!(f, "unconnected"),
            Lifecycle::Connected => write!(f, "connected"),
            Lifecycle::Closed => write!(f, "closed"),
        }
    }
}

/// Which of the two verifier-controlled flags a frame touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateFlag {
    AgentControl,
    VerifiedAction,
}

impl GateFlag {
    fn mask(self) -> u8 {
        match self {
            GateFlag::AgentControl => AGENT_CONTROL,
            GateFlag::VerifiedAction => VERIFIED_ACTION,
        }
    }
}

impl fmt::Display for GateFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateFlag::AgentControl => write!(f, "agent_control"),
            GateFlag::VerifiedAction => write!(f, "verified_action"),
        }
    }
}

/// Shared gate flags. Cheap to read from any thread.
#[derive(Debug, Default)]
pub struct GateState {
    bits: AtomicU8,
}

impl GateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent_control(&self) -> bool {
        self.bits.load(Ordering::Acquire) & AGENT_CONTROL != 0
    }

    pub fn verified_action(&self) -> bool {
        self.bits.load(Ordering::Acquire) & VERIFIED_ACTION != 0
    }

    /// Read both flags in one atomic load.
    pub fn flags(&self) -> (bool, bool) {
        let bits = self.bits.load(Ordering::Acquire);
        (bits & AGENT_CONTROL != 0, bits & VERIFIED_ACTION != 0)
    }

    /// Apply one inbound control frame. Sets exactly one flag and leaves
    /// the other untouched. Returns the flag and its new value.
    pub(crate) fn apply(&self, message: InboundMessage) -> (GateFlag, bool) {
        let (flag, value) = match message {
            InboundMessage::AgentControl(value) => (GateFlag::AgentControl, value),
            InboundMessage::ActionVerified(value) => (GateFlag::VerifiedAction, value),
        };
        let mask = flag.mask();
        if value {
            self.bits.fetch_or(mask, Ordering::AcqRel);
        } else {
            self.bits.fetch_and(!mask, Ordering::AcqRel);
        }
        (flag, value)
    }
}

/// Point-in-time view of the gate used by [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub agent_control: bool,
    pub verified_action: bool,
    pub lifecycle: Lifecycle,
}

impl GateSnapshot {
    pub fn capture(gate: &GateState, lifecycle: Lifecycle) -> Self {
        let (agent_control, verified_action) = gate.flags();
        Self {
            agent_control,
            verified_action,
            lifecycle,
        }
    }
}

/// Outcome of consulting the gate for a single firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Invoke the delegate; send nothing.
    Allow,
    /// Withhold the delegate; report the firing's payload instead.
    SuppressAndReport,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::SuppressAndReport => write!(f, "suppress_and_report"),
        }
    }
}

/// Decide whether an action may proceed.
///
/// Level-triggered against the snapshot: a flag flipping between capture and
/// branch is not corrected.
pub fn decide(gate: &GateSnapshot) -> Decision {
    if gate.lifecycle == Lifecycle::Closed {
        return Decision::Allow;
    }
    if !gate.agent_control {
        return Decision::Allow;
    }
    if gate.verified_action {
        return Decision::Allow;
    }
    Decision::SuppressAndReport
}
