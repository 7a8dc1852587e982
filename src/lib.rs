//! Statecraft: a hierarchical state machine engine
//!
//! A model of states and transitions is declared once with a builder,
//! validated as a whole and frozen. Any number of machines then run that
//! model, each with its own active state, context and event queue.
//!
//! # Core Concepts
//!
//! - **Model**: Immutable graph of simple, composite, initial and final states
//! - **Guards**: Pure predicates over the context and the triggering event
//! - **Actions**: Entry, exit and transition callbacks that update the context
//! - **Machine**: Processes events one at a time; a step commits completely or not at all
//! - **Listeners**: Per-machine observers of transitions, failures and lifecycle
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{ModelBuilder, TransitionBuilder};
//! use statecraft::core::{Context, Event};
//! use statecraft::engine::Machine;
//! use statecraft::model::StateKind;
//! use statecraft::{event_enum, state_enum};
//! use std::sync::Arc;
//!
//! state_enum! {
//!     enum Door {
//!         Closed,
//!         Open,
//!         Locked,
//!     }
//! }
//!
//! event_enum! {
//!     enum Action {
//!         Push,
//!         Pull,
//!         Lock,
//!     }
//! }
//!
//! let model = ModelBuilder::new()
//!     .state(Door::Closed, StateKind::Initial)
//!     .state(Door::Open, StateKind::Simple)
//!     .state(Door::Locked, StateKind::Simple)
//!     .add_transition(Door::Closed, Door::Open, Action::Pull)
//!     .add_transition(Door::Open, Door::Closed, Action::Push)
//!     .transition(
//!         TransitionBuilder::new()
//!             .from(Door::Closed)
//!             .to(Door::Locked)
//!             .on(Action::Lock)
//!             .when(|ctx: &Context, _: &Event<Action>| ctx.contains("key")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut door = Machine::new(Arc::new(model), Context::new());
//! door.start().unwrap();
//!
//! door.submit(Action::Lock).unwrap();
//! assert_eq!(door.current_state(), &Door::Closed);
//!
//! door.submit(Action::Pull).unwrap();
//! assert_eq!(door.current_state(), &Door::Open);
//! ```

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod engine;
pub mod listener;
pub mod model;

// Re-export commonly used types
pub use builder::{ModelBuilder, ModelError, TransitionBuilder};
pub use config::MachineConfig;
pub use core::{Action, Condition, Context, Event, Guard, Identifier, Scope};
pub use engine::{Machine, MachineError, Status};
pub use model::{StateKind, StateModel};
