// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::domain::gate::Lifecycle;

/// Transport failures surfaced to the caller of `connect` or `send`.
///
/// Malformed inbound frames and calls made while disconnected are not
/// errors: the first are logged and dropped by the receive loop, the second
/// return [`SendStatus::Skipped`](crate::infrastructure::connection::SendStatus).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to connect to verifier at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Timed out after {timeout:?} connecting to verifier at {address}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("Failed to write frame to verifier: {0}")]
    Write(#[source] io::Error),

    #[error("Connection already {0}; a manager opens at most one connection")]
    AlreadyConnected(Lifecycle),

    #[error("Failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
