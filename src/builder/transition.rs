//! Builder for declaring transitions.

use crate::builder::error::ModelViolation;
use crate::core::{Action, ActionError, Condition, Context, Event, Guard, Identifier, Scope};

/// A fully specified transition declaration, not yet validated against the
/// state set.
pub(crate) struct TransitionDecl<S: Identifier, E: Identifier> {
    pub(crate) name: Option<String>,
    pub(crate) source: S,
    pub(crate) target: S,
    pub(crate) event: Option<E>,
    pub(crate) condition: Option<Condition>,
    pub(crate) guard: Option<Guard<E>>,
    pub(crate) actions: Vec<Action<S, E>>,
    pub(crate) priority: i32,
}

/// Builder for declaring transitions with a fluent API.
///
/// Source and target are required. Without [`on`](Self::on) the transition
/// is a completion transition: it fires without an event once its
/// [`condition`](Self::condition) holds, right after the step that entered
/// its source. Missing fields are reported by `ModelBuilder::build` together
/// with all other problems of the model.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::TransitionBuilder;
/// use statecraft::core::{Context, Event, Scope};
///
/// let withdraw = TransitionBuilder::<String, String>::new()
///     .from("Open".to_string())
///     .to("Open".to_string())
///     .on("withdraw".to_string())
///     .when(|ctx: &Context, _: &Event<String>| ctx.get::<i64>("balance").ok().flatten() > Some(0))
///     .action(|scope: &mut Scope<String, String>| {
///         let balance: i64 = scope.context().get("balance")?.unwrap_or(0);
///         scope.set("balance", balance - 1)?;
///         Ok(())
///     })
///     .priority(10)
///     .named("withdraw");
/// # let _ = withdraw;
/// ```
pub struct TransitionBuilder<S: Identifier, E: Identifier> {
    name: Option<String>,
    from: Option<S>,
    to: Option<S>,
    event: Option<E>,
    condition: Option<Condition>,
    guard: Option<Guard<E>>,
    actions: Vec<Action<S, E>>,
    priority: i32,
}

impl<S: Identifier, E: Identifier> TransitionBuilder<S, E> {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self {
            name: None,
            from: None,
            to: None,
            event: None,
            condition: None,
            guard: None,
            actions: Vec::new(),
            priority: 0,
        }
    }

    /// Set the source state (required).
    pub fn from(mut self, state: S) -> Self {
        self.from = Some(state);
        self
    }

    /// Set the target state (required).
    pub fn to(mut self, state: S) -> Self {
        self.to = Some(state);
        self
    }

    /// Set the triggering event type.
    pub fn on(mut self, event: E) -> Self {
        self.event = Some(event);
        self
    }

    /// Gate the transition on the context alone. Completion transitions
    /// use this instead of an event guard.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Add a condition using a closure.
    pub fn when_ready<F>(self, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.condition(Condition::new(predicate))
    }

    /// Add an event guard (optional; requires an event).
    pub fn guard(mut self, guard: Guard<E>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure (optional).
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Context, &Event<E>) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Append an action using a closure. Actions run in the order added.
    pub fn action<F>(self, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.then(Action::new(f))
    }

    /// Append a prepared action.
    pub fn then(mut self, action: Action<S, E>) -> Self {
        self.actions.push(action);
        self
    }

    /// Set the priority (default 0).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Give the transition a unique name, used in logs and errors.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Finish the declaration. `index` is the declaration position, used to
    /// identify unnamed transitions in violations.
    pub(crate) fn build(self, index: usize) -> Result<TransitionDecl<S, E>, ModelViolation> {
        let missing = |missing| ModelViolation::IncompleteTransition { index, missing };
        let source = self.from.ok_or_else(|| missing("source"))?;
        let target = self.to.ok_or_else(|| missing("target"))?;
        if self.event.is_none() && self.guard.is_some() {
            return Err(missing("event"));
        }

        Ok(TransitionDecl {
            name: self.name,
            source,
            target,
            event: self.event,
            condition: self.condition,
            guard: self.guard,
            actions: self.actions,
            priority: self.priority,
        })
    }
}

impl<S: Identifier, E: Identifier> Default for TransitionBuilder<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Tb = TransitionBuilder<String, String>;

    #[test]
    fn builder_validates_missing_target() {
        let result = Tb::new().from("Idle".into()).on("go".into()).build(3);

        assert!(matches!(
            result,
            Err(ModelViolation::IncompleteTransition {
                index: 3,
                missing: "target"
            })
        ));
    }

    #[test]
    fn event_guard_needs_an_event() {
        let result = Tb::new()
            .from("Idle".into())
            .to("Busy".into())
            .when(|_: &Context, _: &Event<String>| true)
            .build(0);

        assert!(matches!(
            result,
            Err(ModelViolation::IncompleteTransition {
                missing: "event",
                ..
            })
        ));
    }

    #[test]
    fn fluent_api_builds_declaration() {
        let decl = Tb::new()
            .from("Idle".into())
            .to("Busy".into())
            .on("go".into())
            .when(|_: &Context, _: &Event<String>| true)
            .action(|_: &mut Scope<String, String>| Ok(()))
            .action(|_: &mut Scope<String, String>| Ok(()))
            .priority(-2)
            .named("go")
            .build(0)
            .unwrap();

        assert_eq!(decl.source, "Idle");
        assert_eq!(decl.target, "Busy");
        assert_eq!(decl.event.as_deref(), Some("go"));
        assert_eq!(decl.priority, -2);
        assert_eq!(decl.actions.len(), 2);
        assert!(decl.guard.is_some());
        assert_eq!(decl.name.as_deref(), Some("go"));
    }

    #[test]
    fn no_event_declares_a_completion() {
        let decl = Tb::new()
            .from("Loading".into())
            .to("Ready".into())
            .when_ready(|ctx: &Context| ctx.contains("loaded"))
            .build(0)
            .unwrap();

        assert!(decl.event.is_none());
        assert!(decl.condition.is_some());
        assert!(decl.guard.is_none());
    }
}
