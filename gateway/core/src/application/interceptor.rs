// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Generic Interceptor
//!
//! One adapter that stands between a host callback and the action it
//! triggers. Every firing consults the gate once:
//!
//! - `Allow`: the delegate runs synchronously on the calling task and
//!   nothing is sent.
//! - `SuppressAndReport`: the payload is reported with `updateState` and the
//!   delegate is withheld. The firing is consumed; the user re-triggers the
//!   event once the verifier approves.
//!
//! Exactly one of {delegate invoked, update reported} happens per firing.
//!
//! Host callbacks come in three shapes ([`EventShape`]). The `fire*` methods
//! on [`Interceptor`] cover them directly; [`EventBinding`] lets a concrete
//! widget binding plug in once and be driven through [`GuardedBinding`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::event_shape::EventShape;
use crate::domain::gate::{decide, Decision, GateSnapshot};
use crate::domain::predicate::StateUpdate;
use crate::error::GatewayResult;
use crate::infrastructure::connection::SendStatus;

/// Gate access plus the outbound half of the protocol, as seen by an
/// interceptor. Implemented by [`StateManager`](super::state_manager::StateManager).
#[async_trait]
pub trait StateReporter: Send + Sync {
    /// Current gate snapshot. Must not block.
    fn gate(&self) -> GateSnapshot;

    /// Send an `updateState` carrying `updates`.
    async fn report(&self, updates: Vec<StateUpdate>) -> GatewayResult<SendStatus>;

    /// Hook for diagnostics; called once per firing.
    fn record_decision(&self, _decision: Decision, _shape: EventShape) {}
}

/// The state reported when a firing is suppressed.
#[derive(Clone)]
pub enum Payload {
    Fixed(Vec<StateUpdate>),
    /// Produced at fire time, and only on the suppress path
    Lazy(Arc<dyn Fn() -> Vec<StateUpdate> + Send + Sync>),
}

impl Payload {
    pub fn produce(&self) -> Vec<StateUpdate> {
        match self {
            Payload::Fixed(updates) => updates.clone(),
            Payload::Lazy(produce) => produce(),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Fixed(updates) => f.debug_tuple("Fixed").field(updates).finish(),
            Payload::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<Vec<StateUpdate>> for Payload {
    fn from(updates: Vec<StateUpdate>) -> Self {
        Payload::Fixed(updates)
    }
}

impl From<StateUpdate> for Payload {
    fn from(update: StateUpdate) -> Self {
        Payload::Fixed(vec![update])
    }
}

/// What happened to one firing.
#[derive(Debug)]
pub enum Firing<T> {
    /// The delegate ran and returned `T`
    Allowed(T),
    /// The delegate was withheld; holds the result of reporting the payload
    Suppressed(GatewayResult<SendStatus>),
}

impl<T> Firing<T> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Firing::Allowed(_))
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Firing::Suppressed(_))
    }

    pub fn allowed(self) -> Option<T> {
        match self {
            Firing::Allowed(value) => Some(value),
            Firing::Suppressed(_) => None,
        }
    }
}

pub struct Interceptor<R: ?Sized> {
    reporter: Arc<R>,
    payload: Payload,
}

impl<R: ?Sized> Clone for Interceptor<R> {
    fn clone(&self) -> Self {
        Self {
            reporter: self.reporter.clone(),
            payload: self.payload.clone(),
        }
    }
}

impl<R: StateReporter + ?Sized> Interceptor<R> {
    pub fn new(reporter: Arc<R>, payload: impl Into<Payload>) -> Self {
        Self {
            reporter,
            payload: payload.into(),
        }
    }

    /// Build the payload only when a firing is suppressed.
    pub fn lazy<F>(reporter: Arc<R>, produce: F) -> Self
    where
        F: Fn() -> Vec<StateUpdate> + Send + Sync + 'static,
    {
        Self {
            reporter,
            payload: Payload::Lazy(Arc::new(produce)),
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Apply the gate to one firing of any shape.
    pub async fn intercept<T, F>(&self, shape: EventShape, delegate: F) -> Firing<T>
    where
        F: FnOnce() -> T,
    {
        let decision = decide(&self.reporter.gate());
        self.reporter.record_decision(decision, shape);

        match decision {
            Decision::Allow => {
                debug!(shape = %shape, "Gate allows action");
                Firing::Allowed(delegate())
            }
            Decision::SuppressAndReport => {
                let updates = self.payload.produce();
                debug!(
                    shape = %shape,
                    updates = updates.len(),
                    "Gate suppresses action, reporting state for verification"
                );
                let result = self.reporter.report(updates).await;
                if let Err(e) = &result {
                    warn!(shape = %shape, error = %e, "Failed to report state for suppressed action");
                }
                Firing::Suppressed(result)
            }
        }
    }

    /// No-argument notification, e.g. a click.
    pub async fn fire<F>(&self, delegate: F) -> Firing<()>
    where
        F: FnOnce(),
    {
        self.intercept(EventShape::NoArg, delegate).await
    }

    /// Single-value callback, e.g. a checked-change or item selection.
    pub async fn fire_with<V, F>(&self, value: V, delegate: F) -> Firing<()>
    where
        F: FnOnce(V),
    {
        self.intercept(EventShape::SingleValue, move || delegate(value))
            .await
    }

    /// Value-returning callback. A suppressed firing returns `false` so the
    /// host does not treat it as handled.
    pub async fn fire_returning<V, F>(&self, value: V, delegate: F) -> bool
    where
        F: FnOnce(V) -> bool,
    {
        match self
            .intercept(EventShape::ValueReturning, move || delegate(value))
            .await
        {
            Firing::Allowed(handled) => handled,
            Firing::Suppressed(_) => false,
        }
    }

    pub fn bind<B: EventBinding>(self, binding: B) -> GuardedBinding<B, R> {
        GuardedBinding {
            interceptor: self,
            binding,
        }
    }
}

/// Adaptation interface a concrete event-source binding implements once.
pub trait EventBinding {
    type Event;
    type Output;

    const SHAPE: EventShape;

    /// Invoke the original action.
    fn dispatch(&self, event: Self::Event) -> Self::Output;

    /// Value handed back to the host when the action is suppressed.
    fn not_handled() -> Self::Output;
}

pub struct NoArgBinding<F> {
    action: F,
}

impl<F: Fn()> NoArgBinding<F> {
    pub fn new(action: F) -> Self {
        Self { action }
    }
}

impl<F: Fn()> EventBinding for NoArgBinding<F> {
    type Event = ();
    type Output = ();

    const SHAPE: EventShape = EventShape::NoArg;

    fn dispatch(&self, _event: ()) {
        (self.action)()
    }

    fn not_handled() {}
}

pub struct ValueBinding<V, F> {
    action: F,
    _value: PhantomData<fn(V)>,
}

impl<V, F: Fn(V)> ValueBinding<V, F> {
    pub fn new(action: F) -> Self {
        Self {
            action,
            _value: PhantomData,
        }
    }
}

impl<V, F: Fn(V)> EventBinding for ValueBinding<V, F> {
    type Event = V;
    type Output = ();

    const SHAPE: EventShape = EventShape::SingleValue;

    fn dispatch(&self, event: V) {
        (self.action)(event)
    }

    fn not_handled() {}
}

pub struct ReturningBinding<V, F> {
    action: F,
    _value: PhantomData<fn(V)>,
}

impl<V, F: Fn(V) -> bool> ReturningBinding<V, F> {
    pub fn new(action: F) -> Self {
        Self {
            action,
            _value: PhantomData,
        }
    }
}

impl<V, F: Fn(V) -> bool> EventBinding for ReturningBinding<V, F> {
    type Event = V;
    type Output = bool;

    const SHAPE: EventShape = EventShape::ValueReturning;

    fn dispatch(&self, event: V) -> bool {
        (self.action)(event)
    }

    fn not_handled() -> bool {
        false
    }
}

/// A binding whose primary callback goes through the gate.
pub struct GuardedBinding<B, R: ?Sized> {
    interceptor: Interceptor<R>,
    binding: B,
}

impl<B: EventBinding, R: StateReporter + ?Sized> GuardedBinding<B, R> {
    pub async fn handle(&self, event: B::Event) -> B::Output {
        match self
            .interceptor
            .intercept(B::SHAPE, || self.binding.dispatch(event))
            .await
        {
            Firing::Allowed(output) => output,
            Firing::Suppressed(_) => B::not_handled(),
        }
    }

    /// Dispatch without consulting the gate, for companion callbacks the
    /// verifier does not govern (a "nothing selected" or "tab unselected").
    pub fn bypass(&self, event: B::Event) -> B::Output {
        self.binding.dispatch(event)
    }

    pub fn interceptor(&self) -> &Interceptor<R> {
        &self.interceptor
    }
}
