//! Runtime errors of a machine.

use crate::core::{ActionError, GuardError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle status of a machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    New,
    Started,
    Stopped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::New => "new",
            Self::Started => "started",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Errors returned while starting a machine or processing events.
///
/// Guard and action failures leave the machine exactly as it was before the
/// failing step.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("Guard of transition '{transition}' failed in state '{state}': {source}")]
    Guard {
        state: String,
        transition: String,
        #[source]
        source: GuardError,
    },

    #[error("Action failed during {phase}: {source}")]
    Action {
        phase: String,
        #[source]
        source: ActionError,
    },

    #[error("No transition from '{state}' accepts event '{event}'")]
    UnhandledEvent { state: String, event: String },

    #[error("Machine is stopped; event '{event}' rejected")]
    InstanceStopped { event: String },

    #[error("Machine has not been started; event '{event}' rejected")]
    NotStarted { event: String },

    #[error("Cannot move from {from} to {to}")]
    InvalidLifecycle { from: Status, to: Status },

    #[error("Event queue is full ({capacity} events)")]
    QueueFull { capacity: usize },

    #[error("Step limit of {limit} reached with {pending} events still queued")]
    StepLimitExceeded { limit: usize, pending: usize },

    #[error("Completion transitions still enabled in '{state}' after {limit} in one step")]
    CompletionLimitExceeded { limit: usize, state: String },

    #[error("State '{state}' is not part of the model")]
    UnknownState { state: String },
}

impl MachineError {
    /// Whether the machine state was left untouched by a failing callback.
    pub fn is_callback_failure(&self) -> bool {
        matches!(self, Self::Guard { .. } | Self::Action { .. })
    }
}
