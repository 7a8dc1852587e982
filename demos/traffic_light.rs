//! Traffic Light State Machine
//!
//! A cyclic machine with a guarded pedestrian request.
//!
//! Key concepts:
//! - Cyclic transitions with no final state
//! - Guards reading the context
//! - Transition actions updating the context
//! - Reading the journal after a run
//!
//! Run with: cargo run --example traffic_light

use statecraft::builder::{ModelBuilder, TransitionBuilder};
use statecraft::core::{Context, Event};
use statecraft::engine::Machine;
use statecraft::model::StateKind;
use statecraft::{event_enum, state_enum};
use std::sync::Arc;

state_enum! {
    enum Light {
        Red,
        Green,
        Yellow,
    }
}

event_enum! {
    enum Signal {
        Timer,
        Walk,
    }
}

fn main() {
    println!("=== Traffic Light State Machine ===\n");

    let model = ModelBuilder::named("traffic_light")
        .state(Light::Red, StateKind::Initial)
        .state(Light::Green, StateKind::Simple)
        .state(Light::Yellow, StateKind::Simple)
        .transition(
            TransitionBuilder::new()
                .from(Light::Red)
                .to(Light::Green)
                .on(Signal::Timer)
                .action(|scope| {
                    let cycles: u32 = scope.context().get("cycles")?.unwrap_or(0);
                    scope.set("cycles", cycles + 1)?;
                    Ok(())
                }),
        )
        .add_transition(Light::Green, Light::Yellow, Signal::Timer)
        .add_transition(Light::Yellow, Light::Red, Signal::Timer)
        .transition(
            TransitionBuilder::new()
                .named("pedestrian")
                .from(Light::Green)
                .to(Light::Yellow)
                .on(Signal::Walk)
                .when(|ctx: &Context, _: &Event<Signal>| {
                    ctx.get::<bool>("walk_enabled").ok().flatten().unwrap_or(false)
                }),
        )
        .build()
        .unwrap();

    let mut light = Machine::new(Arc::new(model), Context::new().with("walk_enabled", true));
    light.start().unwrap();
    println!("Initial state: {:?}\n", light.current_state());

    println!("Transition sequence:");
    for signal in [
        Signal::Timer,
        Signal::Walk,
        Signal::Timer,
        Signal::Timer,
        Signal::Walk,
    ] {
        let before = light.current_state().clone();
        light.submit(signal.clone()).unwrap();
        println!("  {:?} --{:?}--> {:?}", before, signal, light.current_state());
    }

    let cycles: u32 = light.context().get("cycles").unwrap().unwrap_or(0);
    println!("\nCompleted cycles: {cycles}");
    println!("Path: {:?}", light.journal().path());

    println!("\nKey Characteristics:");
    println!("- No final state (cycles indefinitely)");
    println!("- Walk is ignored outside Green");
    println!("- Unhandled events leave the light unchanged");

    println!("\n=== Example Complete ===");
}
