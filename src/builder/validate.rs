//! Structural validation of model declarations.
//!
//! Every check returns a `Validation` so that all violations are collected
//! in one pass instead of stopping at the first failure.

use crate::builder::error::ModelViolation;
use crate::builder::model::{ModelBuilder, StateDecl};
use crate::builder::transition::TransitionDecl;
use crate::core::Identifier;
use crate::model::StateKind;
use std::collections::{HashMap, HashSet};
use stillwater::{NonEmptyVec, Validation};

type Checked = Validation<(), NonEmptyVec<ModelViolation>>;

/// Run every check, accumulating ALL violations.
pub(crate) fn validate<S: Identifier, E: Identifier>(builder: &ModelBuilder<S, E>) -> Checked {
    let kinds: HashMap<&S, StateKind> = builder
        .states
        .iter()
        .map(|decl| (&decl.id, decl.kind))
        .collect();

    accumulate(vec![
        unique_states(&builder.states),
        known_parents(&builder.states, &kinds),
        acyclic(&builder.states),
        one_initial_per_level(&builder.states, &builder.initials, &kinds),
        known_hook_targets(builder, &kinds),
        transitions(builder, &kinds),
    ])
}

fn accumulate(checks: Vec<Checked>) -> Checked {
    let mut violations = Vec::new();
    for check in checks {
        if let Validation::Failure(errors) = check {
            violations.extend(errors);
        }
    }
    from_violations(violations)
}

fn from_violations(violations: Vec<ModelViolation>) -> Checked {
    match NonEmptyVec::from_vec(violations) {
        Some(errors) => Validation::Failure(errors),
        None => Validation::Success(()),
    }
}

fn unique_states<S: Identifier>(states: &[StateDecl<S>]) -> Checked {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let violations = states
        .iter()
        .filter(|decl| !seen.insert(&decl.id) && reported.insert(&decl.id))
        .map(|decl| ModelViolation::DuplicateState(decl.id.name().to_string()))
        .collect();
    from_violations(violations)
}

fn known_parents<S: Identifier>(states: &[StateDecl<S>], kinds: &HashMap<&S, StateKind>) -> Checked {
    let violations = states
        .iter()
        .filter_map(|decl| {
            let parent = decl.parent.as_ref()?;
            match kinds.get(parent) {
                None => Some(ModelViolation::UnknownParent {
                    state: decl.id.name().to_string(),
                    parent: parent.name().to_string(),
                }),
                Some(kind) if !kind.is_composite() => Some(ModelViolation::ParentNotComposite {
                    state: decl.id.name().to_string(),
                    parent: parent.name().to_string(),
                }),
                Some(_) => None,
            }
        })
        .collect();
    from_violations(violations)
}

fn acyclic<S: Identifier>(states: &[StateDecl<S>]) -> Checked {
    let parents: HashMap<&S, &S> = states
        .iter()
        .filter_map(|decl| decl.parent.as_ref().map(|p| (&decl.id, p)))
        .collect();

    let violations = states
        .iter()
        .filter(|decl| {
            // A chain longer than the state count must revisit some state.
            let mut cursor = parents.get(&decl.id).copied();
            for _ in 0..=states.len() {
                match cursor {
                    None => return false,
                    Some(p) if *p == decl.id => return true,
                    Some(p) => cursor = parents.get(p).copied(),
                }
            }
            false
        })
        .map(|decl| ModelViolation::HierarchyCycle(decl.id.name().to_string()))
        .collect();
    from_violations(violations)
}

fn one_initial_per_level<S: Identifier>(
    states: &[StateDecl<S>],
    initials: &[S],
    kinds: &HashMap<&S, StateKind>,
) -> Checked {
    let mut violations: Vec<ModelViolation> = initials
        .iter()
        .filter(|id| !kinds.contains_key(id))
        .map(|id| ModelViolation::UnknownState {
            state: id.name().to_string(),
            context: "initial designation".to_string(),
        })
        .collect();

    let mut levels: Vec<Option<&S>> = vec![None];
    levels.extend(
        states
            .iter()
            .filter(|decl| decl.kind.is_composite())
            .map(|decl| Some(&decl.id)),
    );

    let mut seen_levels = HashSet::new();
    for level in levels {
        if !seen_levels.insert(level) {
            continue;
        }
        let mut chosen: Vec<String> = Vec::new();
        for decl in states.iter().filter(|decl| decl.parent.as_ref() == level) {
            let designated = decl.kind == StateKind::Initial || initials.contains(&decl.id);
            let name = decl.id.name().to_string();
            if designated && !chosen.contains(&name) {
                chosen.push(name);
            }
        }

        let scope = match level {
            None => "the root level".to_string(),
            Some(id) => format!("composite '{}'", id.name()),
        };
        match chosen.len() {
            0 => violations.push(ModelViolation::MissingInitial(scope)),
            1 => {}
            _ => violations.push(ModelViolation::MultipleInitial {
                scope,
                states: chosen,
            }),
        }
    }
    from_violations(violations)
}

fn known_hook_targets<S: Identifier, E: Identifier>(
    builder: &ModelBuilder<S, E>,
    kinds: &HashMap<&S, StateKind>,
) -> Checked {
    let violations = builder
        .hooks
        .iter()
        .filter(|hook| !kinds.contains_key(&hook.state))
        .map(|hook| ModelViolation::UnknownState {
            state: hook.state.name().to_string(),
            context: "entry/exit action".to_string(),
        })
        .collect();
    from_violations(violations)
}

fn transitions<S: Identifier, E: Identifier>(
    builder: &ModelBuilder<S, E>,
    kinds: &HashMap<&S, StateKind>,
) -> Checked {
    let mut violations = Vec::new();
    let mut complete: Vec<&TransitionDecl<S, E>> = Vec::new();

    for decl in &builder.transitions {
        match decl {
            Ok(decl) => complete.push(decl),
            Err(violation) => violations.push(violation.clone()),
        }
    }

    for decl in &complete {
        for (state, context) in [
            (&decl.source, "transition source"),
            (&decl.target, "transition target"),
        ] {
            if !kinds.contains_key(state) {
                violations.push(ModelViolation::UnknownState {
                    state: state.name().to_string(),
                    context: context.to_string(),
                });
            }
        }
        if kinds.get(&decl.source).is_some_and(|kind| kind.is_final()) {
            violations.push(ModelViolation::TransitionFromFinal {
                state: decl.source.name().to_string(),
                event: trigger_name(&decl.event),
            });
        }
    }

    let mut names = HashSet::new();
    let mut reported_names = HashSet::new();
    for name in complete.iter().filter_map(|decl| decl.name.as_deref()) {
        if !names.insert(name) && reported_names.insert(name) {
            violations.push(ModelViolation::DuplicateTransitionName(name.to_string()));
        }
    }

    violations.extend(ambiguities(&complete));
    from_violations(violations)
}

/// Event name for messages; completion transitions have none.
fn trigger_name<E: Identifier>(event: &Option<E>) -> String {
    match event {
        Some(event) => event.name().to_string(),
        None => "<completion>".to_string(),
    }
}

/// Pairs of transitions that no rule can order: same source, event and
/// priority with indistinguishable guards. Reported once per group.
fn ambiguities<S: Identifier, E: Identifier>(
    decls: &[&TransitionDecl<S, E>],
) -> Vec<ModelViolation> {
    let mut reported = HashSet::new();
    let mut violations = Vec::new();

    for (i, a) in decls.iter().enumerate() {
        for b in &decls[i + 1..] {
            let same_slot =
                a.source == b.source && a.event == b.event && a.priority == b.priority;
            let same_guard = match (&a.guard, &b.guard) {
                (None, None) => true,
                (Some(x), Some(y)) => x.same_as(y),
                _ => false,
            };
            let same_condition = match (&a.condition, &b.condition) {
                (None, None) => true,
                (Some(x), Some(y)) => x.same_as(y),
                _ => false,
            };
            if same_slot
                && same_guard
                && same_condition
                && reported.insert((&a.source, &a.event, a.priority))
            {
                violations.push(ModelViolation::AmbiguousTransition {
                    state: a.source.name().to_string(),
                    event: trigger_name(&a.event),
                    priority: a.priority,
                });
            }
        }
    }
    violations
}
