//! Entry, exit and transition actions.
//!
//! Actions are the only place where the machine context changes. They run
//! inside a [`Scope`] that stages every mutation: if any action of a
//! transition fails, the staged context and any raised events are thrown
//! away and the machine is left exactly as it was.

use super::context::{Context, ContextError};
use super::event::Event;
use super::identifier::Identifier;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a failing action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Event payload rejected: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Where an action is attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase<S> {
    Entry(S),
    Exit(S),
    Transition { source: S, target: S },
}

impl<S: Identifier> fmt::Display for Phase<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(state) => write!(f, "entry of '{}'", state.name()),
            Self::Exit(state) => write!(f, "exit of '{}'", state.name()),
            Self::Transition { source, target } => {
                write!(f, "transition '{}' -> '{}'", source.name(), target.name())
            }
        }
    }
}

/// Execution scope handed to every action.
///
/// Gives mutable access to the staged context, read access to the
/// triggering event, and a way to raise follow-up events. Raised events are
/// appended to the machine's queue after the current step commits; they are
/// never processed inline.
pub struct Scope<'a, S: Identifier, E: Identifier> {
    context: &'a mut Context,
    event: Option<&'a Event<E>>,
    phase: &'a Phase<S>,
    raised: &'a mut Vec<Event<E>>,
}

impl<'a, S: Identifier, E: Identifier> Scope<'a, S, E> {
    pub(crate) fn new(
        context: &'a mut Context,
        event: Option<&'a Event<E>>,
        phase: &'a Phase<S>,
        raised: &'a mut Vec<Event<E>>,
    ) -> Self {
        Self {
            context,
            event,
            phase,
            raised,
        }
    }

    pub fn context(&self) -> &Context {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut *self.context
    }

    /// The event being processed. `None` while the machine is starting.
    pub fn event(&self) -> Option<&Event<E>> {
        self.event
    }

    /// The state entry/exit or transition this action belongs to.
    pub fn phase(&self) -> &Phase<S> {
        self.phase
    }

    /// Queue an event for processing after the current step.
    pub fn raise(&mut self, event: impl Into<Event<E>>) {
        self.raised.push(event.into());
    }

    /// Shorthand for `context_mut().set(..)`.
    pub fn set<T: serde::Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), ContextError> {
        self.context.set(key, value)
    }
}

/// Capability of running a side effect against a [`Scope`].
///
/// Any `Fn(&mut Scope<S, E>) -> Result<(), ActionError>` closure qualifies.
pub trait Execute<S: Identifier, E: Identifier>: Send + Sync {
    fn execute(&self, scope: &mut Scope<'_, S, E>) -> Result<(), ActionError>;
}

impl<S, E, F> Execute<S, E> for F
where
    S: Identifier,
    E: Identifier,
    F: Fn(&mut Scope<'_, S, E>) -> Result<(), ActionError> + Send + Sync,
{
    fn execute(&self, scope: &mut Scope<'_, S, E>) -> Result<(), ActionError> {
        self(scope)
    }
}

/// Shared handle to an action.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{Action, Scope};
///
/// let count_visits: Action<String, String> = Action::new(|scope: &mut Scope<String, String>| {
///     let visits: u32 = scope.context().get("visits")?.unwrap_or(0);
///     scope.set("visits", visits + 1)?;
///     Ok(())
/// });
/// # let _ = count_visits;
/// ```
pub struct Action<S: Identifier, E: Identifier> {
    label: Option<String>,
    inner: Arc<dyn Execute<S, E>>,
}

impl<S: Identifier, E: Identifier> Action<S, E> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_, S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Self::from_executor(f)
    }

    pub fn named<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        let mut action = Self::new(f);
        action.label = Some(label.into());
        action
    }

    /// Wrap any [`Execute`] implementation.
    pub fn from_executor(executor: impl Execute<S, E> + 'static) -> Self {
        Self {
            label: None,
            inner: Arc::new(executor),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn run(&self, scope: &mut Scope<'_, S, E>) -> Result<(), ActionError> {
        self.inner.execute(scope)
    }
}

impl<S: Identifier, E: Identifier> Clone for Action<S, E> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Identifier, E: Identifier> fmt::Debug for Action<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("label", &self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Sc<'a> = Scope<'a, String, String>;

    fn run(action: &Action<String, String>, ctx: &mut Context) -> (Result<(), ActionError>, Vec<Event<String>>) {
        let phase = Phase::Entry("Idle".to_string());
        let event = Event::new("go".to_string());
        let mut raised = Vec::new();
        let result = {
            let mut scope = Scope::new(ctx, Some(&event), &phase, &mut raised);
            action.run(&mut scope)
        };
        (result, raised)
    }

    #[test]
    fn action_mutates_context() {
        let action = Action::new(|scope: &mut Sc<'_>| {
            scope.set("touched", true)?;
            Ok(())
        });
        let mut ctx = Context::new();

        let (result, _) = run(&action, &mut ctx);

        assert!(result.is_ok());
        assert_eq!(ctx.get::<bool>("touched").unwrap(), Some(true));
    }

    #[test]
    fn action_raises_events_without_running_them() {
        let action = Action::new(|scope: &mut Sc<'_>| {
            scope.raise("next".to_string());
            scope.raise(Event::new("after".to_string()));
            Ok(())
        });
        let mut ctx = Context::new();

        let (_, raised) = run(&action, &mut ctx);

        let kinds: Vec<&str> = raised.iter().map(|e| e.kind().as_str()).collect();
        assert_eq!(kinds, vec!["next", "after"]);
    }

    #[test]
    fn action_sees_event_and_phase() {
        let action = Action::new(|scope: &mut Sc<'_>| {
            let kind = scope.event().map(|e| e.kind().clone());
            let entering = matches!(scope.phase(), Phase::Entry(s) if s == "Idle");
            scope.set("kind", kind)?;
            scope.set("entering", entering)?;
            Ok(())
        });
        let mut ctx = Context::new();

        run(&action, &mut ctx).0.unwrap();

        assert_eq!(ctx.get::<String>("kind").unwrap().as_deref(), Some("go"));
        assert_eq!(ctx.get::<bool>("entering").unwrap(), Some(true));
    }

    #[test]
    fn failing_action_reports_error() {
        let action = Action::named("explode", |_: &mut Sc<'_>| Err(ActionError::new("boom")));
        let mut ctx = Context::new();

        let (result, _) = run(&action, &mut ctx);

        assert_eq!(action.label(), Some("explode"));
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
