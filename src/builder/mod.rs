//! Builder API for state model construction.
//!
//! [`ModelBuilder`] collects state, hook and transition declarations and
//! freezes them into an immutable [`StateModel`](crate::model::StateModel).
//! The `state_enum!` and `event_enum!` macros generate identifier enums with
//! minimal boilerplate.

pub mod error;
pub mod macros;
pub mod model;
pub mod transition;
mod validate;

pub use error::{ModelError, ModelViolation};
pub use model::ModelBuilder;
pub use transition::TransitionBuilder;
