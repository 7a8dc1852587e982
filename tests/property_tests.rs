//! Property-based tests for machine behavior.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated event sequences.

use proptest::prelude::*;
use statecraft::builder::{ModelBuilder, TransitionBuilder};
use statecraft::config::UnhandledPolicy;
use statecraft::core::{ActionError, Context, Event, Guard};
use statecraft::engine::{Machine, MachineError, Status};
use statecraft::model::{StateKind, StateModel};
use statecraft::{event_enum, state_enum};
use std::sync::Arc;

state_enum! {
    enum Player {
        Idle,
        Running,
        Active,
        Paused,
        Done,
    }
}

event_enum! {
    enum Input {
        Play,
        Pause,
        Resume,
        Stop,
        Finish,
        Bump,
        Noise,
        Explode,
    }
}

fn player_model() -> StateModel<Player, Input> {
    ModelBuilder::named("player")
        .state(Player::Idle, StateKind::Initial)
        .state(Player::Running, StateKind::Composite)
        .substate(Player::Active, StateKind::Initial, Player::Running)
        .substate(Player::Paused, StateKind::Simple, Player::Running)
        .state(Player::Done, StateKind::Final)
        .add_transition(Player::Idle, Player::Running, Input::Play)
        .add_transition(Player::Active, Player::Paused, Input::Pause)
        .add_transition(Player::Paused, Player::Active, Input::Resume)
        .add_transition(Player::Running, Player::Idle, Input::Stop)
        .add_transition(Player::Running, Player::Done, Input::Finish)
        .transition(
            TransitionBuilder::new()
                .from(Player::Active)
                .to(Player::Active)
                .on(Input::Bump)
                .action(|scope| {
                    let bumps: i64 = scope.context().get("bumps")?.unwrap_or(0);
                    scope.set("bumps", bumps + 1)?;
                    Ok(())
                }),
        )
        .transition(
            TransitionBuilder::new()
                .from(Player::Idle)
                .to(Player::Running)
                .on(Input::Explode)
                .action(|scope| {
                    scope.set("tainted", true)?;
                    Err(ActionError::new("boom"))
                }),
        )
        .on_entry(Player::Running, |scope| {
            let entries: i64 = scope.context().get("entries")?.unwrap_or(0);
            scope.set("entries", entries + 1)?;
            Ok(())
        })
        .build()
        .unwrap()
}

fn started(model: &Arc<StateModel<Player, Input>>) -> Machine<Player, Input> {
    let mut machine = Machine::new(Arc::clone(model), Context::new());
    machine.start().unwrap();
    machine
}

/// Everything observable about a machine after a run.
fn observe(machine: &Machine<Player, Input>) -> (Player, Status, Context, Vec<Player>) {
    (
        machine.current_state().clone(),
        machine.status(),
        machine.context().clone(),
        machine.journal().path().into_iter().cloned().collect(),
    )
}

prop_compose! {
    fn arbitrary_input()(variant in 0..8u8) -> Input {
        match variant {
            0 => Input::Play,
            1 => Input::Pause,
            2 => Input::Resume,
            3 => Input::Stop,
            4 => Input::Finish,
            5 => Input::Bump,
            6 => Input::Noise,
            _ => Input::Explode,
        }
    }
}

proptest! {
    #[test]
    fn build_is_deterministic(inputs in prop::collection::vec(arbitrary_input(), 0..30)) {
        let first = Arc::new(player_model());
        let second = Arc::new(player_model());
        let mut a = started(&first);
        let mut b = started(&second);

        for input in inputs {
            let ra = a.submit(input.clone()).map_err(|e| e.to_string());
            let rb = b.submit(input).map_err(|e| e.to_string());
            prop_assert_eq!(ra, rb);
            prop_assert_eq!(a.current_state(), b.current_state());
        }
        prop_assert_eq!(observe(&a), observe(&b));
    }

    #[test]
    fn fifo_result_is_independent_of_submission_style(
        inputs in prop::collection::vec(arbitrary_input(), 0..30)
    ) {
        let model = Arc::new(player_model());

        let mut one_by_one = started(&model);
        for input in &inputs {
            let _ = one_by_one.submit(input.clone());
        }

        let mut prefilled = started(&model);
        for input in &inputs {
            prefilled.enqueue(input.clone()).unwrap();
        }
        // A failing event is consumed, so every retry makes progress.
        while prefilled.run_pending().is_err() {}

        prop_assert_eq!(observe(&one_by_one), observe(&prefilled));
    }

    #[test]
    fn higher_priority_wins_when_all_guards_pass(
        priorities in prop::collection::vec(-5..5i32, 1..6)
    ) {
        let targets: Vec<String> = (0..priorities.len()).map(|i| format!("T{i}")).collect();
        let mut builder = ModelBuilder::<String, String>::new().state("Start".into(), StateKind::Initial);
        for (i, (priority, target)) in priorities.iter().zip(&targets).enumerate() {
            builder = builder.state(target.clone(), StateKind::Simple).transition(
                TransitionBuilder::new()
                    .from("Start".into())
                    .to(target.clone())
                    .on("go".into())
                    .guard(Guard::named(format!("g{i}"), |_: &Context, _: &Event<String>| true))
                    .priority(*priority),
            );
        }
        let mut machine = Machine::new(Arc::new(builder.build().unwrap()), Context::new());
        machine.start().unwrap();
        machine.submit("go".to_string()).unwrap();

        let best = *priorities.iter().max().unwrap();
        let expected = priorities.iter().position(|p| *p == best).unwrap();
        prop_assert_eq!(machine.current_state(), &targets[expected]);
    }

    #[test]
    fn unmatched_events_change_nothing(
        prefix in prop::collection::vec(arbitrary_input(), 0..15),
        noise in 1..10usize
    ) {
        let model = Arc::new(player_model());
        let mut machine = started(&model);
        for input in prefix {
            let _ = machine.submit(input);
        }
        prop_assume!(machine.status() == Status::Started);

        let before = observe(&machine);
        for _ in 0..noise {
            prop_assert!(machine.submit(Input::Noise).is_ok());
        }
        prop_assert_eq!(observe(&machine), before);
    }

    #[test]
    fn unmatched_events_fail_only_when_strict(prefix in prop::collection::vec(arbitrary_input(), 0..15)) {
        let model = Arc::new(player_model());
        let config = statecraft::MachineConfig::default().unhandled(UnhandledPolicy::Strict);
        let mut machine = Machine::with_config(model, Context::new(), config);
        machine.start().unwrap();
        for input in prefix {
            let _ = machine.submit(input);
        }
        prop_assume!(machine.status() == Status::Started);

        let before = observe(&machine);
        let is_unhandled = matches!(
            machine.submit(Input::Noise),
            Err(MachineError::UnhandledEvent { .. })
        );
        prop_assert!(is_unhandled);
        prop_assert_eq!(observe(&machine), before);
    }

    #[test]
    fn failing_action_leaves_machine_untouched(
        prefix in prop::collection::vec(arbitrary_input(), 0..15)
    ) {
        let model = Arc::new(player_model());
        let mut machine = started(&model);
        for input in prefix {
            let _ = machine.submit(input);
        }

        let before = observe(&machine);
        let history_before = machine.last_child(&Player::Running).cloned();
        let _ = machine.submit(Input::Explode);

        prop_assert_eq!(observe(&machine), before);
        prop_assert_eq!(machine.last_child(&Player::Running).cloned(), history_before);
        prop_assert!(!machine.context().contains("tainted"));
    }
}
