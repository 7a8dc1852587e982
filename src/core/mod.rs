//! Core value types of the state machine.
//!
//! This module contains the pieces every other layer is built from:
//! - Identifiers for states and event types
//! - Events and the key-value machine context
//! - Guard predicates and actions, as capability traits
//! - The transition journal
//!
//! Nothing in here knows about the model graph or the runtime.

mod action;
mod context;
mod event;
mod guard;
mod history;
mod identifier;

pub use action::{Action, ActionError, Execute, Phase, Scope};
pub use context::{Context, ContextError};
pub use event::Event;
pub use guard::{Condition, Evaluate, Guard, GuardError};
pub use history::{TransitionLog, TransitionRecord};
pub use identifier::Identifier;
