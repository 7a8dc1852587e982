//! Build errors for state models.

use thiserror::Error;

/// A single reason why a set of declarations cannot form a valid model.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModelViolation {
    #[error("State '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("{context} references unknown state '{state}'")]
    UnknownState { state: String, context: String },

    #[error("Parent '{parent}' of state '{state}' is not declared")]
    UnknownParent { state: String, parent: String },

    #[error("Parent '{parent}' of state '{state}' is not a composite state")]
    ParentNotComposite { state: String, parent: String },

    #[error("State '{0}' is its own ancestor")]
    HierarchyCycle(String),

    #[error("No initial state declared in {0}")]
    MissingInitial(String),

    #[error("Multiple initial states declared in {scope}: {}", .states.join(", "))]
    MultipleInitial { scope: String, states: Vec<String> },

    #[error("Final state '{state}' has an outgoing transition on '{event}'")]
    TransitionFromFinal { state: String, event: String },

    #[error("Transitions from '{state}' on '{event}' with priority {priority} cannot be told apart")]
    AmbiguousTransition {
        state: String,
        event: String,
        priority: i32,
    },

    #[error("Transition name '{0}' is used more than once")]
    DuplicateTransitionName(String),

    #[error("Transition #{index} is missing its {missing}")]
    IncompleteTransition { index: usize, missing: &'static str },
}

/// Returned by `ModelBuilder::build` with every violation found.
///
/// Validation does not stop at the first problem, so a single build attempt
/// reports everything that needs fixing.
#[derive(Debug, Error)]
#[error("Invalid state model: {}", summarize(.violations))]
pub struct ModelError {
    violations: Vec<ModelViolation>,
}

impl ModelError {
    pub(crate) fn new(violations: Vec<ModelViolation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[ModelViolation] {
        &self.violations
    }

    pub fn contains(&self, violation: &ModelViolation) -> bool {
        self.violations.contains(violation)
    }

    pub fn into_violations(self) -> Vec<ModelViolation> {
        self.violations
    }
}

fn summarize(violations: &[ModelViolation]) -> String {
    match violations {
        [] => "no violations".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}
