//! Guard predicates for controlling state transitions.
//!
//! Guards are pure boolean functions that determine whether a transition
//! can fire. They see the machine context and the triggering event, and
//! cannot mutate either.

use super::context::{Context, ContextError};
use super::event::Event;
use super::identifier::Identifier;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a fallible guard.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Event payload rejected: {0}")]
    Payload(#[from] serde_json::Error),
}

impl GuardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Capability of deciding whether a transition may fire.
///
/// Any `Fn(&Context, &Event<E>) -> bool` closure qualifies; implement the
/// trait directly for reusable guard types.
pub trait Evaluate<E: Identifier>: Send + Sync {
    fn evaluate(&self, context: &Context, event: &Event<E>) -> Result<bool, GuardError>;
}

impl<E, F> Evaluate<E> for F
where
    E: Identifier,
    F: Fn(&Context, &Event<E>) -> bool + Send + Sync,
{
    fn evaluate(&self, context: &Context, event: &Event<E>) -> Result<bool, GuardError> {
        Ok(self(context, event))
    }
}

struct Fallible<F>(F);

impl<E, F> Evaluate<E> for Fallible<F>
where
    E: Identifier,
    F: Fn(&Context, &Event<E>) -> Result<bool, GuardError> + Send + Sync,
{
    fn evaluate(&self, context: &Context, event: &Event<E>) -> Result<bool, GuardError> {
        (self.0)(context, event)
    }
}

/// Shared handle to a guard predicate.
///
/// Guards may carry a label. Two transitions leaving the same state on the
/// same event with equal priority are ambiguous when their guards share a
/// label (or are the same guard instance), which the model builder rejects.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{Context, Event, Guard};
///
/// let has_credit = Guard::named("has_credit", |ctx: &Context, _event: &Event<String>| {
///     ctx.get::<u32>("credit").ok().flatten().unwrap_or(0) > 0
/// });
///
/// let event = Event::new("buy".to_string());
/// assert!(!has_credit.check(&Context::new(), &event).unwrap());
/// assert!(has_credit.check(&Context::new().with("credit", 3), &event).unwrap());
/// ```
pub struct Guard<E: Identifier> {
    label: Option<String>,
    predicate: Arc<dyn Evaluate<E>>,
}

impl<E: Identifier> Guard<E> {
    /// Create a guard from a pure predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context, &Event<E>) -> bool + Send + Sync + 'static,
    {
        Self::from_evaluator(predicate)
    }

    /// Create a labeled guard.
    pub fn named<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Context, &Event<E>) -> bool + Send + Sync + 'static,
    {
        Self::new(predicate).with_label(label)
    }

    /// Create a guard that can fail, e.g. while decoding the payload.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&Context, &Event<E>) -> Result<bool, GuardError> + Send + Sync + 'static,
    {
        Self::from_evaluator(Fallible(predicate))
    }

    /// Wrap any [`Evaluate`] implementation.
    pub fn from_evaluator(evaluator: impl Evaluate<E> + 'static) -> Self {
        Self {
            label: None,
            predicate: Arc::new(evaluator),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Evaluate the guard.
    pub fn check(&self, context: &Context, event: &Event<E>) -> Result<bool, GuardError> {
        self.predicate.evaluate(context, event)
    }

    /// Whether two guards are interchangeable for ambiguity detection.
    pub(crate) fn same_as(&self, other: &Guard<E>) -> bool {
        match (&self.label, &other.label) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.predicate, &other.predicate),
        }
    }
}

impl<E: Identifier> Clone for Guard<E> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<E: Identifier> fmt::Debug for Guard<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("label", &self.label).finish()
    }
}

/// Predicate over the context alone.
///
/// Conditions gate completion transitions, which fire without an event as
/// soon as their condition holds. They can also be attached to event
/// transitions, where they are checked before the event guard.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{Condition, Context};
///
/// let drained = Condition::named("drained", |ctx: &Context| {
///     ctx.get::<u32>("pending").ok().flatten() == Some(0)
/// });
///
/// assert!(!drained.check(&Context::new().with("pending", 2)).unwrap());
/// assert!(drained.check(&Context::new().with("pending", 0)).unwrap());
/// ```
pub struct Condition {
    label: Option<String>,
    predicate: Arc<dyn Fn(&Context) -> Result<bool, GuardError> + Send + Sync>,
}

impl Condition {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self::fallible(move |context: &Context| Ok(predicate(context)))
    }

    pub fn named<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self::new(predicate).with_label(label)
    }

    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&Context) -> Result<bool, GuardError> + Send + Sync + 'static,
    {
        Self {
            label: None,
            predicate: Arc::new(predicate),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn check(&self, context: &Context) -> Result<bool, GuardError> {
        (self.predicate)(context)
    }

    /// Same rule as [`Guard`]: equal labels, or the same predicate instance.
    pub(crate) fn same_as(&self, other: &Condition) -> bool {
        match (&self.label, &other.label) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.predicate, &other.predicate),
        }
    }
}

impl Clone for Condition {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").field("label", &self.label).finish()
    }
}
