//! Builder for constructing state models.

use crate::builder::error::{ModelError, ModelViolation};
use crate::builder::transition::{TransitionBuilder, TransitionDecl};
use crate::builder::validate;
use crate::config::Resolution;
use crate::core::{Action, ActionError, Identifier, Scope};
use crate::model::{
    StateIndex, StateKind, StateModel, StateNode, TransitionDef, TransitionIndex,
};
use std::collections::HashMap;
use stillwater::Validation;

pub(crate) struct StateDecl<S: Identifier> {
    pub(crate) id: S,
    pub(crate) kind: StateKind,
    pub(crate) parent: Option<S>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HookSlot {
    Entry,
    Exit,
}

pub(crate) struct HookDecl<S: Identifier, E: Identifier> {
    pub(crate) state: S,
    pub(crate) slot: HookSlot,
    pub(crate) action: Action<S, E>,
}

/// Builder for state models with a fluent API.
///
/// Declarations are only checked by [`build`](Self::build), which reports
/// every problem at once instead of stopping at the first one.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::ModelBuilder;
/// use statecraft::model::StateKind;
///
/// let model = ModelBuilder::<String, String>::named("job")
///     .state("Idle".into(), StateKind::Initial)
///     .state("Running".into(), StateKind::Simple)
///     .state("Done".into(), StateKind::Final)
///     .add_transition("Idle".into(), "Running".into(), "start".into())
///     .add_transition("Running".into(), "Done".into(), "finish".into())
///     .build()
///     .unwrap();
///
/// assert_eq!(model.initial_state(), "Idle");
/// ```
pub struct ModelBuilder<S: Identifier, E: Identifier> {
    pub(crate) name: Option<String>,
    pub(crate) resolution: Resolution,
    pub(crate) states: Vec<StateDecl<S>>,
    pub(crate) initials: Vec<S>,
    pub(crate) hooks: Vec<HookDecl<S, E>>,
    pub(crate) transitions: Vec<Result<TransitionDecl<S, E>, ModelViolation>>,
}

impl<S: Identifier, E: Identifier> ModelBuilder<S, E> {
    pub fn new() -> Self {
        Self {
            name: None,
            resolution: Resolution::default(),
            states: Vec::new(),
            initials: Vec::new(),
            hooks: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Create a builder for a named model.
    pub fn named(name: impl Into<String>) -> Self {
        let mut builder = Self::new();
        builder.name = Some(name.into());
        builder
    }

    /// Set how competing transitions are ordered.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Declare a top-level state.
    pub fn state(self, id: S, kind: StateKind) -> Self {
        self.add_state(id, kind, None)
    }

    /// Declare a state nested in a composite.
    pub fn substate(self, id: S, kind: StateKind, parent: S) -> Self {
        self.add_state(id, kind, Some(parent))
    }

    pub fn add_state(mut self, id: S, kind: StateKind, parent: Option<S>) -> Self {
        self.states.push(StateDecl { id, kind, parent });
        self
    }

    /// Mark a state as the initial state of its hierarchy level.
    ///
    /// Needed for composite states; leaf states can use [`StateKind::Initial`]
    /// instead.
    pub fn initial(mut self, id: S) -> Self {
        self.initials.push(id);
        self
    }

    /// Append an entry action to a state.
    pub fn on_entry<F>(self, state: S, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.entry_action(state, Action::new(f))
    }

    /// Append an exit action to a state.
    pub fn on_exit<F>(self, state: S, f: F) -> Self
    where
        F: Fn(&mut Scope<'_, S, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.exit_action(state, Action::new(f))
    }

    pub fn entry_action(mut self, state: S, action: Action<S, E>) -> Self {
        self.hooks.push(HookDecl {
            state,
            slot: HookSlot::Entry,
            action,
        });
        self
    }

    pub fn exit_action(mut self, state: S, action: Action<S, E>) -> Self {
        self.hooks.push(HookDecl {
            state,
            slot: HookSlot::Exit,
            action,
        });
        self
    }

    /// Add a transition using a builder.
    pub fn transition(mut self, builder: TransitionBuilder<S, E>) -> Self {
        let index = self.transitions.len();
        self.transitions.push(builder.build(index));
        self
    }

    /// Add an unguarded transition without actions.
    pub fn add_transition(self, source: S, target: S, event: E) -> Self {
        self.transition(TransitionBuilder::new().from(source).to(target).on(event))
    }

    /// Validate every declaration and freeze the model.
    pub fn build(self) -> Result<StateModel<S, E>, ModelError> {
        match validate::validate(&self) {
            Validation::Success(()) => self.freeze().map_err(|v| ModelError::new(vec![v])),
            Validation::Failure(violations) => {
                let mut all = Vec::new();
                all.extend(violations);
                Err(ModelError::new(all))
            }
        }
    }

    /// Lay out the validated declarations in index arenas.
    fn freeze(self) -> Result<StateModel<S, E>, ModelViolation> {
        let index: HashMap<S, StateIndex> = self
            .states
            .iter()
            .enumerate()
            .map(|(i, decl)| (decl.id.clone(), StateIndex(i)))
            .collect();
        let lookup = |id: &S, context: &str| {
            index
                .get(id)
                .copied()
                .ok_or_else(|| ModelViolation::UnknownState {
                    state: id.name().to_string(),
                    context: context.to_string(),
                })
        };

        let mut states = Vec::with_capacity(self.states.len());
        for decl in &self.states {
            let parent = match &decl.parent {
                Some(p) => Some(lookup(p, "parent")?),
                None => None,
            };
            states.push(StateNode {
                id: decl.id.clone(),
                kind: decl.kind,
                parent,
                children: Vec::new(),
                initial_child: None,
                depth: 0,
                entry: Vec::new(),
                exit: Vec::new(),
                outgoing: Vec::new(),
            });
        }

        for i in 0..states.len() {
            let mut depth = 0;
            let mut cursor = states[i].parent;
            while let Some(p) = cursor {
                depth += 1;
                cursor = states[p.0].parent;
            }
            states[i].depth = depth;
            if let Some(p) = states[i].parent {
                states[p.0].children.push(StateIndex(i));
            }
        }

        let mut root_initial = None;
        for (i, decl) in self.states.iter().enumerate() {
            let designated = decl.kind == StateKind::Initial || self.initials.contains(&decl.id);
            if !designated {
                continue;
            }
            match states[i].parent {
                Some(p) => states[p.0].initial_child = Some(StateIndex(i)),
                None => root_initial = Some(StateIndex(i)),
            }
        }
        let root_initial =
            root_initial.ok_or_else(|| ModelViolation::MissingInitial("the root level".into()))?;

        for hook in self.hooks {
            let idx = lookup(&hook.state, "entry/exit action")?;
            match hook.slot {
                HookSlot::Entry => states[idx.0].entry.push(hook.action),
                HookSlot::Exit => states[idx.0].exit.push(hook.action),
            }
        }

        let mut transitions = Vec::with_capacity(self.transitions.len());
        let mut dispatch: HashMap<(StateIndex, E), Vec<TransitionIndex>> = HashMap::new();
        let mut completions: HashMap<StateIndex, Vec<TransitionIndex>> = HashMap::new();
        for (order, decl) in self.transitions.into_iter().enumerate() {
            let decl = decl?;
            let source = lookup(&decl.source, "transition source")?;
            let target = lookup(&decl.target, "transition target")?;
            let t = TransitionIndex(order);

            states[source.0].outgoing.push(t);
            match &decl.event {
                Some(event) => dispatch.entry((source, event.clone())).or_default().push(t),
                None => completions.entry(source).or_default().push(t),
            }
            transitions.push(TransitionDef {
                name: decl.name,
                source,
                target,
                source_id: decl.source,
                target_id: decl.target,
                event: decl.event,
                condition: decl.condition,
                guard: decl.guard,
                actions: decl.actions,
                priority: decl.priority,
                order,
            });
        }

        let resolution = self.resolution;
        for candidates in dispatch.values_mut().chain(completions.values_mut()) {
            candidates.sort_by(|a, b| {
                let (a, b) = (&transitions[a.0], &transitions[b.0]);
                resolution.compare((a.priority, a.order), (b.priority, b.order))
            });
        }

        Ok(StateModel {
            name: self.name,
            states,
            transitions,
            index,
            dispatch,
            completions,
            root_initial,
            resolution,
        })
    }
}

impl<S: Identifier, E: Identifier> Default for ModelBuilder<S, E> {
    fn default() -> Self {
        Self::new()
    }
}
