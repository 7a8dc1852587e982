//! Running instance of a state model.

use crate::checkpoint::{Checkpoint, CheckpointError, CHECKPOINT_VERSION};
use crate::config::{MachineConfig, UnhandledPolicy};
use crate::core::{Action, Context, Event, Identifier, Phase, Scope, TransitionLog, TransitionRecord};
use crate::engine::error::{MachineError, Status};
use crate::engine::queue::{EventQueue, EventSender};
use crate::engine::resolve::{self, HistoryMap, Plan};
use crate::listener::{
    FailureNotice, Listener, ListenerFault, ListenerId, ListenerRegistry, TransitionNotice,
    UnhandledNotice,
};
use crate::model::{StateIndex, StateModel, TransitionDef, TransitionIndex};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Result of processing a single event
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome<S: Identifier, E: Identifier> {
    /// A transition committed; `source` and `target` are the active leaves
    Transitioned { source: S, target: S },

    /// No transition accepted the event and it was dropped
    Unhandled { state: S, event: E },
}

/// A state machine instance.
///
/// Holds the active leaf state, composite history, context and event queue
/// of one run of a shared [`StateModel`]. Events are processed one at a
/// time in FIFO order. A step either commits completely or leaves the
/// machine untouched.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::ModelBuilder;
/// use statecraft::core::Context;
/// use statecraft::engine::{Machine, Status};
/// use statecraft::model::StateKind;
/// use std::sync::Arc;
///
/// let model = ModelBuilder::<String, String>::new()
///     .state("Idle".into(), StateKind::Initial)
///     .state("Running".into(), StateKind::Simple)
///     .state("Done".into(), StateKind::Final)
///     .add_transition("Idle".into(), "Running".into(), "start".into())
///     .add_transition("Running".into(), "Done".into(), "finish".into())
///     .build()
///     .unwrap();
///
/// let mut machine = Machine::new(Arc::new(model), Context::new());
/// machine.start().unwrap();
/// machine.submit("start".to_string()).unwrap();
/// assert_eq!(machine.current_state(), "Running");
///
/// machine.submit("finish".to_string()).unwrap();
/// assert_eq!(machine.status(), Status::Stopped);
/// ```
pub struct Machine<S: Identifier, E: Identifier> {
    id: Uuid,
    model: Arc<StateModel<S, E>>,
    config: MachineConfig,
    status: Status,
    active: StateIndex,
    history: HistoryMap,
    context: Context,
    journal: TransitionLog<S, E>,
    queue: EventQueue<E>,
    listeners: ListenerRegistry<S, E>,
    sequence: u64,
}

impl<S: Identifier, E: Identifier> Machine<S, E> {
    /// Create a machine with the default configuration.
    pub fn new(model: Arc<StateModel<S, E>>, context: Context) -> Self {
        Self::with_config(model, context, MachineConfig::default())
    }

    pub fn with_config(model: Arc<StateModel<S, E>>, context: Context, config: MachineConfig) -> Self {
        let history = HistoryMap::new();
        let active = resolve::initial(&model, &history).leaf;
        let journal = match config.journal_limit {
            Some(limit) => TransitionLog::bounded(limit),
            None => TransitionLog::new(),
        };
        Self {
            id: Uuid::new_v4(),
            queue: EventQueue::new(config.queue_capacity),
            model,
            config,
            status: Status::New,
            active,
            history,
            context,
            journal,
            listeners: ListenerRegistry::new(),
            sequence: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> &Arc<StateModel<S, E>> {
        &self.model
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The active leaf state. Before `start()` this is the leaf the machine
    /// will enter first.
    pub fn current_state(&self) -> &S {
        &self.model.node(self.active).id
    }

    /// The active configuration, outermost state first.
    pub fn active_states(&self) -> Vec<&S> {
        let mut states: Vec<&S> = self
            .model
            .ancestors(self.active)
            .into_iter()
            .map(|idx| &self.model.node(idx).id)
            .collect();
        states.reverse();
        states.push(self.current_state());
        states
    }

    /// Whether `state` is the active leaf or one of its ancestors.
    pub fn is_in(&self, state: &S) -> bool {
        self.model
            .index_of(state)
            .is_some_and(|idx| self.model.is_descendant_or_self(self.active, idx))
    }

    /// Whether the active leaf is a final state.
    pub fn is_final(&self) -> bool {
        self.model.node(self.active).kind.is_final()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn journal(&self) -> &TransitionLog<S, E> {
        &self.journal
    }

    /// Last active child recorded for a composite state.
    pub fn last_child(&self, composite: &S) -> Option<&S> {
        let idx = self.model.index_of(composite)?;
        self.history.get(&idx).map(|&child| &self.model.node(child).id)
    }

    /// Number of events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Producer handle for other threads.
    pub fn sender(&self) -> EventSender<E> {
        self.queue.sender()
    }

    pub fn add_listener(&mut self, listener: Arc<dyn Listener<S, E>>) -> ListenerId {
        self.listeners.register(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Drain the failures reported by listeners since the last call.
    pub fn take_listener_errors(&mut self) -> Vec<ListenerFault> {
        self.listeners.take_faults()
    }

    /// Enter the initial configuration and begin accepting events.
    ///
    /// Entry actions run outermost to innermost with no triggering event,
    /// followed by any completion transitions that are enabled. If one of
    /// them fails, the machine stays `New` and the error is returned.
    ///
    /// Events raised during start are queued, not processed; they run on the
    /// next `submit`, `step` or `run_pending`.
    pub fn start(&mut self) -> Result<(), MachineError> {
        self.start_from(None)
    }

    /// Start in `state` instead of the initial state.
    ///
    /// Ancestors of `state` are entered outermost first; a composite `state`
    /// then descends through its initial children.
    pub fn start_at(&mut self, state: &S) -> Result<(), MachineError> {
        self.start_from(Some(state))
    }

    fn start_from(&mut self, state: Option<&S>) -> Result<(), MachineError> {
        if self.status != Status::New {
            return Err(MachineError::InvalidLifecycle {
                from: self.status,
                to: Status::Started,
            });
        }

        let model = Arc::clone(&self.model);
        let plan = match state {
            Some(state) => {
                let idx = model.index_of(state).ok_or_else(|| MachineError::UnknownState {
                    state: state.name().to_string(),
                })?;
                resolve::enter(&model, &self.history, idx)
            }
            None => resolve::initial(&model, &self.history),
        };

        let mut stage = self.stage();
        let applied = stage
            .apply(&model, plan, None, None)
            .and_then(|()| settle(&model, &mut stage, None, self.config.max_steps_per_run));
        if let Err(err) = applied {
            return Err(self.fail(None, err));
        }

        self.status = Status::Started;
        self.queue.open();
        let fired = self.commit(stage);
        debug!(machine = %self.id, state = self.current_state().name(), "machine started");

        self.listeners
            .dispatch("on_lifecycle", |l| l.on_lifecycle(Status::New, Status::Started));
        self.announce(&model, fired, None);
        self.stop_if_final(&model);
        Ok(())
    }

    /// Stop the machine. Queued events are discarded and further events are
    /// rejected. Stopping a stopped machine does nothing.
    pub fn stop(&mut self) {
        if self.status == Status::Stopped {
            return;
        }
        let from = self.status;
        self.status = Status::Stopped;

        let discarded = self.queue.close();
        if !discarded.is_empty() {
            debug!(machine = %self.id, count = discarded.len(), "queued events discarded");
        }
        debug!(machine = %self.id, from = %from, "machine stopped");
        self.listeners
            .dispatch("on_lifecycle", |l| l.on_lifecycle(from, Status::Stopped));
    }

    /// Enqueue an event and process the queue.
    ///
    /// Returns the number of events processed, which includes events raised
    /// by actions along the way.
    pub fn submit(&mut self, event: impl Into<Event<E>>) -> Result<usize, MachineError> {
        self.enqueue(event)?;
        self.run_pending()
    }

    /// Enqueue an event without processing it.
    pub fn enqueue(&self, event: impl Into<Event<E>>) -> Result<(), MachineError> {
        self.queue.push(event.into())
    }

    /// Process queued events until the queue is empty or the machine stops.
    ///
    /// A failing event is consumed and its error returned; events behind it
    /// stay queued.
    pub fn run_pending(&mut self) -> Result<usize, MachineError> {
        let limit = self.config.max_steps_per_run;
        let mut processed = 0;
        while self.status == Status::Started {
            if processed >= limit {
                let pending = self.queue.len();
                if pending > 0 {
                    return Err(MachineError::StepLimitExceeded { limit, pending });
                }
                break;
            }
            let Some(event) = self.queue.pop() else {
                break;
            };
            processed += 1;
            self.process(event)?;
        }
        Ok(processed)
    }

    /// Process the next queued event, if any.
    ///
    /// Returns `Ok(None)` when the queue is empty or the machine is not
    /// started.
    pub fn step(&mut self) -> Result<Option<StepOutcome<S, E>>, MachineError> {
        if self.status != Status::Started {
            return Ok(None);
        }
        match self.queue.pop() {
            Some(event) => self.process(event).map(Some),
            None => Ok(None),
        }
    }

    /// Snapshot the runtime data of this machine.
    pub fn checkpoint(&self) -> Checkpoint<S, E> {
        let mut history: Vec<(StateIndex, StateIndex)> =
            self.history.iter().map(|(&c, &child)| (c, child)).collect();
        history.sort();

        Checkpoint {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            machine_id: self.id,
            model_name: self.model.name().map(str::to_string),
            timestamp: Utc::now(),
            status: self.status,
            active: self.current_state().clone(),
            history: history
                .into_iter()
                .map(|(c, child)| (self.model.node(c).id.clone(), self.model.node(child).id.clone()))
                .collect(),
            context: self.context.clone(),
            journal: self.journal.clone(),
            pending: self.queue.snapshot(),
            sequence: self.sequence,
            config: self.config.clone(),
        }
    }

    /// Rebuild a machine from a checkpoint taken on the same model.
    ///
    /// Listeners are not part of a checkpoint and must be added again.
    /// Pending events are processed on the next `run_pending`, `step` or
    /// `submit`.
    pub fn restore(
        model: Arc<StateModel<S, E>>,
        checkpoint: Checkpoint<S, E>,
    ) -> Result<Self, CheckpointError> {
        checkpoint.check_version()?;
        if checkpoint.model_name.as_deref() != model.name() {
            return Err(CheckpointError::ModelMismatch {
                expected: model.name().map(str::to_string),
                found: checkpoint.model_name,
            });
        }

        let lookup = |state: &S| {
            model.index_of(state).ok_or_else(|| {
                CheckpointError::ValidationFailed(format!("unknown state '{}'", state.name()))
            })
        };

        let active = lookup(&checkpoint.active)?;
        if !model.node(active).kind.is_leaf() {
            return Err(CheckpointError::ValidationFailed(format!(
                "active state '{}' is not a leaf",
                checkpoint.active.name()
            )));
        }

        let mut history = HistoryMap::new();
        for (composite, child) in &checkpoint.history {
            let (c, ch) = (lookup(composite)?, lookup(child)?);
            if model.node(ch).parent != Some(c) {
                return Err(CheckpointError::ValidationFailed(format!(
                    "'{}' is not a child of '{}'",
                    child.name(),
                    composite.name()
                )));
            }
            history.insert(c, ch);
        }

        let queue = EventQueue::new(checkpoint.config.queue_capacity);
        match checkpoint.status {
            Status::New => {}
            Status::Started => {
                queue.open();
                queue.refill(checkpoint.pending);
            }
            Status::Stopped => {
                queue.close();
            }
        }

        debug!(machine = %checkpoint.machine_id, state = checkpoint.active.name(), "machine restored");
        Ok(Self {
            id: checkpoint.machine_id,
            model,
            config: checkpoint.config,
            status: checkpoint.status,
            active,
            history,
            context: checkpoint.context,
            journal: checkpoint.journal,
            queue,
            listeners: ListenerRegistry::new(),
            sequence: checkpoint.sequence,
        })
    }

    fn process(&mut self, event: Event<E>) -> Result<StepOutcome<S, E>, MachineError> {
        let model = Arc::clone(&self.model);
        let selected = match resolve::select(&model, self.active, &self.context, Some(&event)) {
            Ok(selected) => selected,
            Err(err) => return Err(self.fail(Some(&event), err)),
        };
        let Some(idx) = selected else {
            return self.unhandled(event);
        };

        let plan = resolve::plan(&model, &self.history, self.active, model.transition(idx));
        let mut stage = self.stage();
        let applied = stage
            .apply(&model, plan, Some(idx), Some(&event))
            .and_then(|()| settle(&model, &mut stage, Some(&event), self.config.max_steps_per_run));
        if let Err(err) = applied {
            return Err(self.fail(Some(&event), err));
        }

        let source = self.current_state().clone();
        let fired = self.commit(stage);
        self.announce(&model, fired, Some(&event));

        let outcome = StepOutcome::Transitioned {
            source,
            target: self.current_state().clone(),
        };
        self.stop_if_final(&model);
        Ok(outcome)
    }

    fn unhandled(&mut self, event: Event<E>) -> Result<StepOutcome<S, E>, MachineError> {
        let policy = self.config.unhandled;
        let state = self.current_state().clone();
        let notice = UnhandledNotice {
            state: &state,
            event: &event,
            policy,
        };
        self.listeners
            .dispatch("on_unhandled", |l| l.on_unhandled(&notice));

        match policy {
            UnhandledPolicy::Drop => {
                warn!(
                    machine = %self.id,
                    state = state.name(),
                    event = event.kind().name(),
                    "unhandled event dropped"
                );
                Ok(StepOutcome::Unhandled {
                    state,
                    event: event.kind().clone(),
                })
            }
            UnhandledPolicy::Strict => Err(MachineError::UnhandledEvent {
                state: state.name().to_string(),
                event: event.kind().name().to_string(),
            }),
        }
    }

    /// Broadcast a failed step and hand the error back.
    fn fail(&mut self, event: Option<&Event<E>>, error: MachineError) -> MachineError {
        let state = &self.model.node(self.active).id;
        debug!(machine = %self.id, state = state.name(), error = %error, "step rolled back");
        let notice = FailureNotice {
            state,
            event,
            error: &error,
        };
        self.listeners.dispatch("on_failure", |l| l.on_failure(&notice));
        error
    }

    fn stage(&self) -> Stage<E> {
        Stage {
            active: self.active,
            history: self.history.clone(),
            context: self.context.clone(),
            raised: Vec::new(),
            fired: Vec::new(),
        }
    }

    fn commit(&mut self, stage: Stage<E>) -> Vec<Fired> {
        self.active = stage.active;
        self.history = stage.history;
        self.context = stage.context;
        self.queue.push_raised(stage.raised);
        stage.fired
    }

    /// Notify listeners and journal every transition of a committed step.
    fn announce(&mut self, model: &StateModel<S, E>, fired: Vec<Fired>, event: Option<&Event<E>>) {
        for step in fired {
            self.notify_path(model, &step.plan);
            let Some(idx) = step.transition else {
                continue;
            };
            let transition = model.transition(idx);
            let trigger = transition.event().and(event);

            self.sequence += 1;
            let record = TransitionRecord {
                sequence: self.sequence,
                source: model.node(step.source).id.clone(),
                target: model.node(step.plan.leaf).id.clone(),
                event: transition.event().cloned(),
                event_id: trigger.map(Event::id),
                transition: transition.name().map(str::to_string),
                timestamp: Utc::now(),
            };
            debug!(
                machine = %self.id,
                from = record.source.name(),
                to = record.target.name(),
                event = record.event.as_ref().map_or("<completion>", |e| e.name()),
                "transition committed"
            );

            let notice = TransitionNotice {
                source: &record.source,
                target: &record.target,
                event: trigger,
                transition: transition.name(),
                context: &self.context,
                record: &record,
            };
            self.listeners
                .dispatch("on_transition", |l| l.on_transition(&notice));
            self.journal.record(record);
        }
    }

    fn notify_path(&mut self, model: &StateModel<S, E>, plan: &Plan) {
        for &state in &plan.exits {
            let id = &model.node(state).id;
            self.listeners
                .dispatch("on_state_exited", |l| l.on_state_exited(id));
        }
        for &state in &plan.entries {
            let id = &model.node(state).id;
            self.listeners
                .dispatch("on_state_entered", |l| l.on_state_entered(id));
        }
    }

    fn stop_if_final(&mut self, model: &StateModel<S, E>) {
        if self.config.stop_on_final
            && model.node(self.active).kind.is_final()
            && !model.can_leave(self.active)
        {
            debug!(machine = %self.id, state = self.current_state().name(), "final state reached");
            self.stop();
        }
    }
}

/// Copy of the runtime data a step works on until it commits.
struct Stage<E: Identifier> {
    active: StateIndex,
    history: HistoryMap,
    context: Context,
    raised: Vec<Event<E>>,
    fired: Vec<Fired>,
}

/// A plan applied to a stage, in firing order.
struct Fired {
    source: StateIndex,
    /// `None` for the entries of a start
    transition: Option<TransitionIndex>,
    plan: Plan,
}

impl<E: Identifier> Stage<E> {
    fn apply<S: Identifier>(
        &mut self,
        model: &StateModel<S, E>,
        plan: Plan,
        transition: Option<TransitionIndex>,
        event: Option<&Event<E>>,
    ) -> Result<(), MachineError> {
        let def = transition.map(|idx| model.transition(idx));
        execute(model, &plan, def, event, &mut self.context, &mut self.raised)?;

        for &state in &plan.entries {
            if let Some(parent) = model.node(state).parent {
                self.history.insert(parent, state);
            }
        }
        let source = self.active;
        self.active = plan.leaf;
        self.fired.push(Fired {
            source,
            transition,
            plan,
        });
        Ok(())
    }
}

/// Fire completion transitions until none is enabled.
///
/// Completion actions see `cause`, the event that started the step.
fn settle<S: Identifier, E: Identifier>(
    model: &StateModel<S, E>,
    stage: &mut Stage<E>,
    cause: Option<&Event<E>>,
    limit: usize,
) -> Result<(), MachineError> {
    let mut fired = 0;
    while let Some(idx) = resolve::select(model, stage.active, &stage.context, None)? {
        if fired >= limit {
            return Err(MachineError::CompletionLimitExceeded {
                limit,
                state: model.node(stage.active).id.name().to_string(),
            });
        }
        let plan = resolve::plan(model, &stage.history, stage.active, model.transition(idx));
        trace!(transition = %model.transition(idx).describe(), "completion fired");
        stage.apply(model, plan, Some(idx), cause)?;
        fired += 1;
    }
    Ok(())
}

/// Run exit, transition and entry actions of a plan against staged data.
fn execute<S: Identifier, E: Identifier>(
    model: &StateModel<S, E>,
    plan: &Plan,
    transition: Option<&TransitionDef<S, E>>,
    event: Option<&Event<E>>,
    context: &mut Context,
    raised: &mut Vec<Event<E>>,
) -> Result<(), MachineError> {
    for &state in &plan.exits {
        let node = model.node(state);
        let phase = Phase::Exit(node.id.clone());
        run_actions(&node.exit, &phase, event, context, raised)?;
    }
    if let Some(t) = transition {
        let phase = Phase::Transition {
            source: t.source_id.clone(),
            target: t.target_id.clone(),
        };
        run_actions(&t.actions, &phase, event, context, raised)?;
    }
    for &state in &plan.entries {
        let node = model.node(state);
        let phase = Phase::Entry(node.id.clone());
        run_actions(&node.entry, &phase, event, context, raised)?;
    }
    Ok(())
}

fn run_actions<S: Identifier, E: Identifier>(
    actions: &[Action<S, E>],
    phase: &Phase<S>,
    event: Option<&Event<E>>,
    context: &mut Context,
    raised: &mut Vec<Event<E>>,
) -> Result<(), MachineError> {
    if actions.is_empty() {
        return Ok(());
    }
    let mut scope = Scope::new(context, event, phase, raised);
    for action in actions {
        action
            .run(&mut scope)
            .map_err(|source| MachineError::Action {
                phase: phase.to_string(),
                source,
            })?;
    }
    Ok(())
}
