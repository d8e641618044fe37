// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Gate flags and the decision rule, predicate schemas, the verifier wire
//! protocol, diagnostics events and configuration. Nothing here touches the
//! network.

pub mod event_shape;
pub mod events;
pub mod gate;
pub mod gateway_config;
pub mod predicate;
pub mod protocol;
