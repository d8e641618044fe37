// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Client-side verification gateway.
//!
//! Intercepts application actions, reports their state to a remote verifier
//! and gates whether each action may proceed.
//!
//! # Architecture
//!
//! - **domain:** gate flags, decision rule, predicates, wire protocol, config
//! - **infrastructure:** TCP connection with its receive loop, event bus
//! - **application:** `StateManager` and the generic `Interceptor`

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::interceptor::{
    EventBinding, Firing, GuardedBinding, Interceptor, NoArgBinding, Payload, ReturningBinding,
    StateReporter, ValueBinding,
};
pub use application::state_manager::StateManager;
pub use domain::event_shape::EventShape;
pub use domain::gate::{decide, Decision, GateSnapshot, GateState, Lifecycle};
pub use domain::predicate::{PredicateDefinition, StateUpdate, Variable, VariableType};
pub use domain::protocol::{InboundMessage, OutboundMessage};
pub use error::{GatewayError, GatewayResult};
pub use infrastructure::connection::SendStatus;
