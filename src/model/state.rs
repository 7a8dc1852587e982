//! State nodes of the model arena.

use crate::core::{Action, Identifier};
use serde::{Deserialize, Serialize};

/// Index of a state in the model arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct StateIndex(pub(crate) usize);

/// Index of a transition in the model arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TransitionIndex(pub(crate) usize);

/// Structural role of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// Plain leaf state
    Simple,

    /// State containing child states, one of which is its initial child
    Composite,

    /// Terminal leaf state; no outgoing transitions allowed
    Final,

    /// Leaf state that is also the initial state of its hierarchy level
    Initial,
}

impl StateKind {
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Composite)
    }

    pub fn is_final(self) -> bool {
        matches!(self, Self::Final)
    }

    pub fn is_leaf(self) -> bool {
        !self.is_composite()
    }
}

/// A state in the frozen model.
#[derive(Debug)]
pub struct StateNode<S: Identifier, E: Identifier> {
    pub(crate) id: S,
    pub(crate) kind: StateKind,
    pub(crate) parent: Option<StateIndex>,
    pub(crate) children: Vec<StateIndex>,
    pub(crate) initial_child: Option<StateIndex>,
    pub(crate) depth: usize,
    pub(crate) entry: Vec<Action<S, E>>,
    pub(crate) exit: Vec<Action<S, E>>,
    pub(crate) outgoing: Vec<TransitionIndex>,
}

impl<S: Identifier, E: Identifier> StateNode<S, E> {
    pub fn id(&self) -> &S {
        &self.id
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Distance from the root level; top-level states have depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn entry_actions(&self) -> &[Action<S, E>] {
        &self.entry
    }

    pub fn exit_actions(&self) -> &[Action<S, E>] {
        &self.exit
    }
}
