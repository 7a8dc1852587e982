//! Frozen state model.
//!
//! A [`StateModel`] is produced once by [`ModelBuilder`](crate::builder::ModelBuilder)
//! and never changes afterwards. States and transitions live in arenas
//! addressed by index; the hierarchy is stored as parent links and walked
//! with plain loops. The model is `Send + Sync` and is meant to be shared
//! through an `Arc` by any number of machines.

mod state;
mod transition;

pub(crate) use state::{StateIndex, TransitionIndex};
pub use state::{StateKind, StateNode};
pub use transition::TransitionDef;

use crate::config::Resolution;
use crate::core::Identifier;
use std::collections::HashMap;

/// Immutable graph of states and transitions.
#[derive(Debug)]
pub struct StateModel<S: Identifier, E: Identifier> {
    pub(crate) name: Option<String>,
    pub(crate) states: Vec<StateNode<S, E>>,
    pub(crate) transitions: Vec<TransitionDef<S, E>>,
    pub(crate) index: HashMap<S, StateIndex>,
    pub(crate) dispatch: HashMap<(StateIndex, E), Vec<TransitionIndex>>,
    pub(crate) completions: HashMap<StateIndex, Vec<TransitionIndex>>,
    pub(crate) root_initial: StateIndex,
    pub(crate) resolution: Resolution,
}

impl<S: Identifier, E: Identifier> StateModel<S, E> {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn contains(&self, state: &S) -> bool {
        self.index.contains_key(state)
    }

    pub fn state(&self, state: &S) -> Option<&StateNode<S, E>> {
        self.index_of(state).map(|idx| self.node(idx))
    }

    pub fn kind_of(&self, state: &S) -> Option<StateKind> {
        self.state(state).map(StateNode::kind)
    }

    pub fn parent_of(&self, state: &S) -> Option<&S> {
        let idx = self.index_of(state)?;
        self.node(idx).parent.map(|p| &self.node(p).id)
    }

    /// Children of a composite state in declaration order.
    pub fn children_of(&self, state: &S) -> Vec<&S> {
        self.index_of(state)
            .map(|idx| {
                self.node(idx)
                    .children
                    .iter()
                    .map(|&c| &self.node(c).id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Proper ancestors of a state, innermost first.
    pub fn ancestors_of(&self, state: &S) -> Vec<&S> {
        self.index_of(state)
            .map(|idx| {
                self.ancestors(idx)
                    .into_iter()
                    .map(|a| &self.node(a).id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The initial state of the root level.
    pub fn initial_state(&self) -> &S {
        &self.node(self.root_initial).id
    }

    /// The initial child of a composite state.
    pub fn initial_child_of(&self, state: &S) -> Option<&S> {
        let idx = self.index_of(state)?;
        self.node(idx).initial_child.map(|c| &self.node(c).id)
    }

    /// Transitions leaving `state`, in declaration order.
    pub fn transitions_from(&self, state: &S) -> Vec<&TransitionDef<S, E>> {
        self.index_of(state)
            .map(|idx| {
                self.node(idx)
                    .outgoing
                    .iter()
                    .map(|&t| self.transition(t))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Transitions leaving `state` on `event`, in the order they are tried.
    pub fn candidates(&self, state: &S, event: &E) -> Vec<&TransitionDef<S, E>> {
        self.index_of(state)
            .map(|idx| {
                self.candidates_at(idx, event)
                    .iter()
                    .map(|&t| self.transition(t))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Completion transitions leaving `state`, in the order they are tried.
    pub fn completions(&self, state: &S) -> Vec<&TransitionDef<S, E>> {
        self.index_of(state)
            .map(|idx| {
                self.completions_at(idx)
                    .iter()
                    .map(|&t| self.transition(t))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &TransitionDef<S, E>> {
        self.transitions.iter()
    }

    /// State ids in declaration order.
    pub fn state_ids(&self) -> impl Iterator<Item = &S> {
        self.states.iter().map(|node| &node.id)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub(crate) fn index_of(&self, state: &S) -> Option<StateIndex> {
        self.index.get(state).copied()
    }

    pub(crate) fn node(&self, idx: StateIndex) -> &StateNode<S, E> {
        &self.states[idx.0]
    }

    pub(crate) fn transition(&self, idx: TransitionIndex) -> &TransitionDef<S, E> {
        &self.transitions[idx.0]
    }

    pub(crate) fn candidates_at(&self, idx: StateIndex, event: &E) -> &[TransitionIndex] {
        // Tuple keys cannot be borrowed piecewise, so the lookup clones the event id.
        self.dispatch
            .get(&(idx, event.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn completions_at(&self, idx: StateIndex) -> &[TransitionIndex] {
        self.completions.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Proper ancestors, innermost first.
    pub(crate) fn ancestors(&self, idx: StateIndex) -> Vec<StateIndex> {
        let mut out = Vec::with_capacity(self.node(idx).depth);
        let mut cursor = self.node(idx).parent;
        while let Some(parent) = cursor {
            out.push(parent);
            cursor = self.node(parent).parent;
        }
        out
    }

    pub(crate) fn is_descendant_or_self(&self, idx: StateIndex, ancestor: StateIndex) -> bool {
        let mut cursor = Some(idx);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.node(current).parent;
        }
        false
    }

    /// Deepest state that is a proper ancestor of both `a` and `b`.
    pub(crate) fn common_ancestor(&self, a: StateIndex, b: StateIndex) -> Option<StateIndex> {
        let of_a = self.ancestors(a);
        self.ancestors(b).into_iter().find(|anc| of_a.contains(anc))
    }

    /// Whether any transition can leave `idx`, declared on it or an ancestor.
    pub(crate) fn can_leave(&self, idx: StateIndex) -> bool {
        let mut cursor = Some(idx);
        while let Some(current) = cursor {
            if !self.node(current).outgoing.is_empty() {
                return true;
            }
            cursor = self.node(current).parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::ModelBuilder;
    use crate::model::StateKind;

    fn s(id: &str) -> String {
        id.to_string()
    }

    fn player() -> crate::model::StateModel<String, String> {
        ModelBuilder::new()
            .state(s("Idle"), StateKind::Initial)
            .state(s("Running"), StateKind::Composite)
            .substate(s("Active"), StateKind::Initial, s("Running"))
            .substate(s("Paused"), StateKind::Simple, s("Running"))
            .state(s("Done"), StateKind::Final)
            .add_transition(s("Idle"), s("Running"), s("play"))
            .add_transition(s("Active"), s("Paused"), s("pause"))
            .add_transition(s("Running"), s("Done"), s("finish"))
            .build()
            .unwrap()
    }

    #[test]
    fn hierarchy_queries() {
        let model = player();

        assert_eq!(model.parent_of(&s("Paused")), Some(&s("Running")));
        assert_eq!(model.parent_of(&s("Idle")), None);
        assert_eq!(model.children_of(&s("Running")), vec![&s("Active"), &s("Paused")]);
        assert_eq!(model.ancestors_of(&s("Paused")), vec![&s("Running")]);
        assert_eq!(model.initial_state(), &s("Idle"));
        assert_eq!(model.initial_child_of(&s("Running")), Some(&s("Active")));
        assert_eq!(model.kind_of(&s("Done")), Some(StateKind::Final));
        assert!(!model.contains(&s("Nowhere")));
    }

    #[test]
    fn common_ancestor_is_proper() {
        let model = player();
        let idx = |id: &str| model.index_of(&s(id)).unwrap();

        assert_eq!(model.common_ancestor(idx("Active"), idx("Paused")), Some(idx("Running")));
        assert_eq!(model.common_ancestor(idx("Running"), idx("Paused")), None);
        assert_eq!(model.common_ancestor(idx("Idle"), idx("Done")), None);
        assert!(model.is_descendant_or_self(idx("Paused"), idx("Running")));
        assert!(!model.is_descendant_or_self(idx("Running"), idx("Paused")));
    }

    #[test]
    fn can_leave_walks_ancestors() {
        let model = player();
        let idx = |id: &str| model.index_of(&s(id)).unwrap();

        assert!(model.can_leave(idx("Paused")));
        assert!(!model.can_leave(idx("Done")));
    }

    #[test]
    fn introspection_counts() {
        let model = player();

        assert_eq!(model.state_count(), 5);
        assert_eq!(model.transition_count(), 3);
        assert_eq!(model.transitions_from(&s("Running")).len(), 1);
        assert_eq!(model.candidates(&s("Active"), &s("pause")).len(), 1);
        assert!(model.candidates(&s("Paused"), &s("pause")).is_empty());
    }

    #[test]
    fn model_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<crate::model::StateModel<String, String>>();
    }
}
