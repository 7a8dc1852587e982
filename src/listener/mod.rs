//! Observers of a running machine.
//!
//! Listeners are registered per machine and notified synchronously. A
//! listener that fails or panics never affects the machine: the failure is
//! logged and kept until the owner drains it with
//! `Machine::take_listener_errors`. Only the most recent
//! [`FAULT_LIMIT`] failures are kept.

use crate::config::UnhandledPolicy;
use crate::core::{Context, Event, Identifier, TransitionRecord};
use crate::engine::{MachineError, Status};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Number of undrained listener failures a registry keeps.
pub const FAULT_LIMIT: usize = 256;

/// Error returned by a listener callback.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Handle returned by registration, used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A committed transition.
#[derive(Debug)]
pub struct TransitionNotice<'a, S: Identifier, E: Identifier> {
    /// Active leaf before the step
    pub source: &'a S,
    /// Active leaf after the step
    pub target: &'a S,
    /// Triggering event; `None` for completion transitions
    pub event: Option<&'a Event<E>>,
    /// Name of the declared transition, if any
    pub transition: Option<&'a str>,
    /// Context after the step
    pub context: &'a Context,
    pub record: &'a TransitionRecord<S, E>,
}

/// A failed start or step. The machine is unchanged.
#[derive(Debug)]
pub struct FailureNotice<'a, S: Identifier, E: Identifier> {
    /// Active leaf when the failure happened
    pub state: &'a S,
    /// `None` when starting the machine failed
    pub event: Option<&'a Event<E>>,
    pub error: &'a MachineError,
}

/// An event no transition accepted.
#[derive(Debug)]
pub struct UnhandledNotice<'a, S: Identifier, E: Identifier> {
    pub state: &'a S,
    pub event: &'a Event<E>,
    pub policy: UnhandledPolicy,
}

/// Observer callbacks. Every method defaults to doing nothing.
///
/// # Example
///
/// ```rust
/// use statecraft::listener::{Listener, ListenerError, TransitionNotice};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl Listener<String, String> for Counter {
///     fn on_transition(&self, _: &TransitionNotice<'_, String, String>) -> Result<(), ListenerError> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait Listener<S: Identifier, E: Identifier>: Send + Sync {
    fn on_transition(&self, _notice: &TransitionNotice<'_, S, E>) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_failure(&self, _notice: &FailureNotice<'_, S, E>) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_unhandled(&self, _notice: &UnhandledNotice<'_, S, E>) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_lifecycle(&self, _from: Status, _to: Status) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Called for every state entered, outermost first.
    fn on_state_entered(&self, _state: &S) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Called for every state exited, innermost first.
    fn on_state_exited(&self, _state: &S) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// A listener callback that returned an error or panicked.
#[derive(Debug)]
pub struct ListenerFault {
    pub listener: ListenerId,
    pub hook: &'static str,
    pub error: ListenerError,
}

/// Instance-scoped set of listeners, notified in registration order.
pub struct ListenerRegistry<S: Identifier, E: Identifier> {
    entries: Vec<(ListenerId, Arc<dyn Listener<S, E>>)>,
    faults: VecDeque<ListenerFault>,
    fault_limit: usize,
    dropped: u64,
}

impl<S: Identifier, E: Identifier> ListenerRegistry<S, E> {
    pub fn new() -> Self {
        Self::with_fault_limit(FAULT_LIMIT)
    }

    /// Keep at most `limit` failures, evicting the oldest.
    pub fn with_fault_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            faults: VecDeque::new(),
            fault_limit: limit.max(1),
            dropped: 0,
        }
    }

    pub fn register(&mut self, listener: Arc<dyn Listener<S, E>>) -> ListenerId {
        let id = ListenerId(Uuid::new_v4());
        self.entries.push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if the id is unknown.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Failures evicted because the limit was reached.
    pub fn dropped_faults(&self) -> u64 {
        self.dropped
    }

    /// Call `hook` on every listener, keeping the failures. A panic is
    /// caught and kept like an error.
    pub(crate) fn dispatch<F>(&mut self, hook: &'static str, mut call: F)
    where
        F: FnMut(&dyn Listener<S, E>) -> Result<(), ListenerError>,
    {
        for (id, listener) in &self.entries {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(listener.as_ref())))
                .unwrap_or_else(|payload| Err(ListenerError::new(panic_message(payload.as_ref()))));
            let Err(error) = outcome else {
                continue;
            };
            warn!(listener = %id, hook, error = %error, "listener failed");
            if self.faults.len() == self.fault_limit {
                self.faults.pop_front();
                self.dropped += 1;
            }
            self.faults.push_back(ListenerFault {
                listener: *id,
                hook,
                error,
            });
        }
    }

    pub(crate) fn take_faults(&mut self) -> Vec<ListenerFault> {
        self.faults.drain(..).collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("listener panicked: {detail}")
}

impl<S: Identifier, E: Identifier> Default for ListenerRegistry<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Listener<String, String> for Recorder {
        fn on_state_entered(&self, state: &String) -> Result<(), ListenerError> {
            self.seen.lock().push(format!("enter {state}"));
            Ok(())
        }
    }

    struct Failing;

    impl Listener<String, String> for Failing {
        fn on_state_entered(&self, _: &String) -> Result<(), ListenerError> {
            Err(ListenerError::new("nope"))
        }
    }

    #[test]
    fn dispatch_reaches_every_listener() {
        let mut registry = ListenerRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register(recorder.clone());
        registry.register(Arc::new(Failing));

        let state = "Idle".to_string();
        registry.dispatch("on_state_entered", |l| l.on_state_entered(&state));

        assert_eq!(*recorder.seen.lock(), vec!["enter Idle".to_string()]);
        let faults = registry.take_faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].hook, "on_state_entered");
        assert!(registry.take_faults().is_empty());
    }

    #[test]
    fn unregister_removes_listener() {
        let mut registry: ListenerRegistry<String, String> = ListenerRegistry::new();
        let id = registry.register(Arc::new(Failing));

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());

        let state = "Idle".to_string();
        registry.dispatch("on_state_entered", |l| l.on_state_entered(&state));
        assert!(registry.take_faults().is_empty());
    }

    #[test]
    fn faults_are_capped_oldest_first() {
        let mut registry = ListenerRegistry::with_fault_limit(2);
        registry.register(Arc::new(Failing));

        for state in ["A", "B", "C"] {
            let state = state.to_string();
            registry.dispatch("on_state_entered", |l| l.on_state_entered(&state));
        }

        assert_eq!(registry.dropped_faults(), 1);
        assert_eq!(registry.take_faults().len(), 2);
        assert_eq!(ListenerRegistry::<String, String>::new().fault_limit, FAULT_LIMIT);
    }

    #[test]
    fn panicking_listener_becomes_a_fault() {
        struct Panicky;
        impl Listener<String, String> for Panicky {
            fn on_state_entered(&self, state: &String) -> Result<(), ListenerError> {
                panic!("cannot enter {state}");
            }
        }

        let mut registry = ListenerRegistry::new();
        registry.register(Arc::new(Panicky));
        let recorder = Arc::new(Recorder::default());
        registry.register(recorder.clone());

        let state = "Idle".to_string();
        registry.dispatch("on_state_entered", |l| l.on_state_entered(&state));

        assert_eq!(*recorder.seen.lock(), vec!["enter Idle".to_string()]);
        let faults = registry.take_faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].error.to_string(), "listener panicked: cannot enter Idle");
    }

    #[test]
    fn default_callbacks_do_nothing() {
        struct Quiet;
        impl Listener<String, String> for Quiet {}

        assert!(Quiet.on_lifecycle(Status::New, Status::Started).is_ok());
        assert!(Quiet.on_state_exited(&"A".to_string()).is_ok());
    }
}
