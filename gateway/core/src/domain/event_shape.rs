// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Callback shapes an interceptor can stand in front of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventShape {
    /// `fn()` notifications such as a click
    NoArg,
    /// `fn(T)` callbacks such as a checked-change or item-selected
    SingleValue,
    /// `fn(T) -> bool` callbacks whose result tells the host the event was consumed
    ValueReturning,
}

impl fmt::Display for EventShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventShape::NoArg => write!(f, "no_arg"),
            EventShape::SingleValue => write!(f, "single_value"),
            EventShape::ValueReturning => write!(f, "value_returning"),
        }
    }
}
