//! Media Player State Machine
//!
//! A hierarchical machine where `Playing` is a composite state that
//! remembers whether it was paused.
//!
//! Key concepts:
//! - Composite states with an initial child
//! - History on re-entry
//! - Listeners observing transitions
//! - Checkpoint and restore
//!
//! Run with: cargo run --example media_player

use statecraft::builder::{ModelBuilder, TransitionBuilder};
use statecraft::core::{Context, Event};
use statecraft::engine::Machine;
use statecraft::listener::{Listener, ListenerError, TransitionNotice};
use statecraft::model::StateKind;
use statecraft::{event_enum, state_enum};
use std::sync::Arc;

state_enum! {
    enum Player {
        Stopped,
        Playing,
        Active,
        Paused,
        Ejected,
    }
}

event_enum! {
    enum Button {
        Play,
        Pause,
        Resume,
        Stop,
        Seek,
        Eject,
    }
}

struct Printer;

impl Listener<Player, Button> for Printer {
    fn on_transition(&self, n: &TransitionNotice<'_, Player, Button>) -> Result<(), ListenerError> {
        println!("  [{:?}] {:?} -> {:?}", n.event.map(|e| e.kind()), n.source, n.target);
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Media Player State Machine ===\n");

    let model = Arc::new(
        ModelBuilder::named("media_player")
            .state(Player::Stopped, StateKind::Initial)
            .state(Player::Playing, StateKind::Composite)
            .substate(Player::Active, StateKind::Initial, Player::Playing)
            .substate(Player::Paused, StateKind::Simple, Player::Playing)
            .state(Player::Ejected, StateKind::Final)
            .add_transition(Player::Stopped, Player::Playing, Button::Play)
            .add_transition(Player::Active, Player::Paused, Button::Pause)
            .add_transition(Player::Paused, Player::Active, Button::Resume)
            .add_transition(Player::Playing, Player::Stopped, Button::Stop)
            .add_transition(Player::Stopped, Player::Ejected, Button::Eject)
            .transition(
                TransitionBuilder::new()
                    .named("seek")
                    .from(Player::Active)
                    .to(Player::Active)
                    .on(Button::Seek)
                    .action(|scope| {
                        let to: u64 = match scope.event() {
                            Some(event) => event.payload_as()?,
                            None => 0,
                        };
                        scope.set("position", to)?;
                        Ok(())
                    }),
            )
            .on_entry(Player::Playing, |scope| {
                let plays: u32 = scope.context().get("plays")?.unwrap_or(0);
                scope.set("plays", plays + 1)?;
                Ok(())
            })
            .build()
            .unwrap(),
    );

    let mut player = Machine::new(Arc::clone(&model), Context::new());
    player.add_listener(Arc::new(Printer));
    player.start().unwrap();

    println!("Play, seek, pause, then stop:");
    player.submit(Button::Play).unwrap();
    player
        .submit(Event::with_payload(Button::Seek, serde_json::json!(42)))
        .unwrap();
    player.submit(Button::Pause).unwrap();
    player.submit(Button::Stop).unwrap();

    println!("\nCheckpoint while stopped, then restore:");
    let json = player.checkpoint().to_json().unwrap();
    let checkpoint = statecraft::checkpoint::Checkpoint::from_json(&json).unwrap();
    let mut restored = Machine::restore(model, checkpoint).unwrap();
    restored.add_listener(Arc::new(Printer));

    restored.submit(Button::Play).unwrap();
    println!("\nBack in {:?} (history remembered the pause)", restored.current_state());
    println!("Active states: {:?}", restored.active_states());
    println!(
        "Plays: {}, position: {}",
        restored.context().get::<u32>("plays").unwrap().unwrap_or(0),
        restored.context().get::<u64>("position").unwrap().unwrap_or(0),
    );

    restored.submit(Button::Stop).unwrap();
    restored.submit(Button::Eject).unwrap();
    println!("\nEjected, status: {}", restored.status());

    println!("\n=== Example Complete ===");
}
