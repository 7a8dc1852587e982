//! Runtime: machines, their event queues and transition resolution.

pub mod error;
pub mod machine;
mod queue;
mod resolve;

pub use error::{MachineError, Status};
pub use machine::{Machine, StepOutcome};
pub use queue::EventSender;
