// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! - **Purpose:** wires the gate, the connection and the event bus into the
//!   `StateManager`, and applies the decision rule to host callbacks through
//!   the generic `Interceptor`.

pub mod interceptor;
pub mod state_manager;
