//! Pure transition selection and path planning.
//!
//! Nothing here mutates a machine: [`select`] picks the transition that
//! handles an event and [`plan`] lays out the states to exit and enter.
//! The machine then runs the plan against a staged context and commits.

use crate::core::{Context, Event, Identifier};
use crate::engine::error::MachineError;
use crate::model::{StateIndex, StateModel, TransitionDef, TransitionIndex};
use std::collections::HashMap;
use tracing::trace;

/// Composite state -> last active child.
pub(crate) type HistoryMap = HashMap<StateIndex, StateIndex>;

/// States to exit and enter for one step.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Plan {
    /// Innermost first
    pub(crate) exits: Vec<StateIndex>,
    /// Outermost first
    pub(crate) entries: Vec<StateIndex>,
    /// Active leaf once the plan is applied
    pub(crate) leaf: StateIndex,
}

/// Find the transition that handles `event` in the active configuration,
/// or the enabled completion transition when `event` is `None`.
///
/// Candidates declared on the leaf are tried before those of its ancestors;
/// within one state they are tried in the model's resolution order. The
/// first unguarded candidate or candidate whose guard passes wins.
pub(crate) fn select<S: Identifier, E: Identifier>(
    model: &StateModel<S, E>,
    leaf: StateIndex,
    context: &Context,
    event: Option<&Event<E>>,
) -> Result<Option<TransitionIndex>, MachineError> {
    let mut cursor = Some(leaf);
    while let Some(state) = cursor {
        let candidates = match event {
            Some(event) => model.candidates_at(state, event.kind()),
            None => model.completions_at(state),
        };
        for &idx in candidates {
            let transition = model.transition(idx);
            let accepted = transition
                .can_fire(context, event)
                .map_err(|source| MachineError::Guard {
                    state: transition.source().name().to_string(),
                    transition: transition.describe(),
                    source,
                })?;
            trace!(
                transition = %transition.describe(),
                accepted,
                "guard evaluated"
            );
            if accepted {
                return Ok(Some(idx));
            }
        }
        cursor = model.node(state).parent;
    }
    Ok(None)
}

/// Lay out the exits and entries for firing `transition` from `leaf`.
///
/// The boundary is the deepest proper ancestor shared by source and
/// target, so a self-transition exits and re-enters its state.
pub(crate) fn plan<S: Identifier, E: Identifier>(
    model: &StateModel<S, E>,
    history: &HistoryMap,
    leaf: StateIndex,
    transition: &TransitionDef<S, E>,
) -> Plan {
    let boundary = model.common_ancestor(transition.source, transition.target);

    let mut exits = Vec::new();
    let mut cursor = Some(leaf);
    while let Some(state) = cursor {
        if Some(state) == boundary {
            break;
        }
        exits.push(state);
        cursor = model.node(state).parent;
    }

    let mut entries = Vec::new();
    let mut cursor = Some(transition.target);
    while let Some(state) = cursor {
        if Some(state) == boundary {
            break;
        }
        entries.push(state);
        cursor = model.node(state).parent;
    }
    entries.reverse();

    let leaf = descend(model, history, transition.target, &mut entries);
    Plan {
        exits,
        entries,
        leaf,
    }
}

/// Entries performed when a machine starts.
pub(crate) fn initial<S: Identifier, E: Identifier>(
    model: &StateModel<S, E>,
    history: &HistoryMap,
) -> Plan {
    enter(model, history, model.root_initial)
}

/// Entries performed when a machine starts at `state`: its ancestors
/// outermost first, the state itself, then down to a leaf.
pub(crate) fn enter<S: Identifier, E: Identifier>(
    model: &StateModel<S, E>,
    history: &HistoryMap,
    state: StateIndex,
) -> Plan {
    let mut entries = model.ancestors(state);
    entries.reverse();
    entries.push(state);
    let leaf = descend(model, history, state, &mut entries);
    Plan {
        exits: Vec::new(),
        entries,
        leaf,
    }
}

/// Walk down from `state` through composites, preferring the recorded
/// history over the initial child, and append every state entered.
fn descend<S: Identifier, E: Identifier>(
    model: &StateModel<S, E>,
    history: &HistoryMap,
    state: StateIndex,
    entries: &mut Vec<StateIndex>,
) -> StateIndex {
    let mut current = state;
    while model.node(current).kind.is_composite() {
        let next = history
            .get(&current)
            .copied()
            .or(model.node(current).initial_child);
        match next {
            Some(child) => {
                entries.push(child);
                current = child;
            }
            None => break,
        }
    }
    current
}
