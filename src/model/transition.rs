//! Declared transitions of the model arena.

use super::state::StateIndex;
use crate::core::{Action, Condition, Context, Event, Guard, GuardError, Identifier};

/// A transition from one state to another.
///
/// Event transitions fire when an event of their type is processed.
/// Completion transitions have no event and fire as soon as their
/// condition holds.
#[derive(Debug)]
pub struct TransitionDef<S: Identifier, E: Identifier> {
    pub(crate) name: Option<String>,
    pub(crate) source: StateIndex,
    pub(crate) target: StateIndex,
    pub(crate) source_id: S,
    pub(crate) target_id: S,
    pub(crate) event: Option<E>,
    pub(crate) condition: Option<Condition>,
    pub(crate) guard: Option<Guard<E>>,
    pub(crate) actions: Vec<Action<S, E>>,
    pub(crate) priority: i32,
    pub(crate) order: usize,
}

impl<S: Identifier, E: Identifier> TransitionDef<S, E> {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn source(&self) -> &S {
        &self.source_id
    }

    pub fn target(&self) -> &S {
        &self.target_id
    }

    /// Triggering event type; `None` for completion transitions.
    pub fn event(&self) -> Option<&E> {
        self.event.as_ref()
    }

    pub fn is_completion(&self) -> bool {
        self.event.is_none()
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn guard(&self) -> Option<&Guard<E>> {
        self.guard.as_ref()
    }

    pub fn actions(&self) -> &[Action<S, E>] {
        &self.actions
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Position among all declared transitions.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Check whether this transition accepts `event`, or fires on its own
    /// when `event` is `None` (pure).
    pub fn can_fire(&self, context: &Context, event: Option<&Event<E>>) -> Result<bool, GuardError> {
        if self.event.as_ref() != event.map(Event::kind) {
            return Ok(false);
        }
        if let Some(condition) = &self.condition {
            if !condition.check(context)? {
                return Ok(false);
            }
        }
        match (&self.guard, event) {
            (Some(guard), Some(event)) => guard.check(context, event),
            _ => Ok(true),
        }
    }

    /// Human-readable label used in errors and logs.
    pub(crate) fn describe(&self) -> String {
        match (&self.name, &self.event) {
            (Some(name), _) => name.clone(),
            (None, Some(event)) => format!(
                "{} --{}--> {}",
                self.source_id.name(),
                event.name(),
                self.target_id.name()
            ),
            (None, None) => format!("{} --> {}", self.source_id.name(), self.target_id.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(event: Option<&str>, guard: Option<Guard<String>>) -> TransitionDef<String, String> {
        TransitionDef {
            name: None,
            source: StateIndex(0),
            target: StateIndex(1),
            source_id: "Idle".to_string(),
            target_id: "Running".to_string(),
            event: event.map(str::to_string),
            condition: None,
            guard,
            actions: Vec::new(),
            priority: 0,
            order: 0,
        }
    }

    #[test]
    fn can_fire_matches_event_kind() {
        let t = def(Some("start"), None);
        let ctx = Context::new();

        assert!(t.can_fire(&ctx, Some(&Event::new("start".to_string()))).unwrap());
        assert!(!t.can_fire(&ctx, Some(&Event::new("stop".to_string()))).unwrap());
        assert!(!t.can_fire(&ctx, None).unwrap());
    }

    #[test]
    fn can_fire_respects_guard() {
        let t = def(
            Some("start"),
            Some(Guard::new(|ctx: &Context, _: &Event<String>| ctx.contains("armed"))),
        );

        let ev = Event::new("start".to_string());
        assert!(!t.can_fire(&Context::new(), Some(&ev)).unwrap());
        assert!(t.can_fire(&Context::new().with("armed", true), Some(&ev)).unwrap());
    }

    #[test]
    fn completion_fires_only_without_event_when_condition_holds() {
        let mut t = def(None, None);
        t.condition = Some(Condition::new(|ctx: &Context| ctx.contains("done")));

        assert!(!t.can_fire(&Context::new(), None).unwrap());
        assert!(t.can_fire(&Context::new().with("done", true), None).unwrap());
        assert!(!t
            .can_fire(&Context::new().with("done", true), Some(&Event::new("start".to_string())))
            .unwrap());
        assert!(t.is_completion());
    }

    #[test]
    fn describe_falls_back_to_edge() {
        let mut t = def(Some("start"), None);
        assert_eq!(t.describe(), "Idle --start--> Running");
        assert_eq!(def(None, None).describe(), "Idle --> Running");

        t.name = Some("launch".to_string());
        assert_eq!(t.describe(), "launch");
    }
}
