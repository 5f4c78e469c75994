use rand::Rng;

use crate::clock::TimerKind;
use crate::commands::apply_commands;
use crate::dispatch;
use crate::{CommandEnvelope, EventEnvelope, GameContent, SessionState};

/// Advance the simulation by one tick.
///
/// Order of operations:
/// 1. Advance the clock by `tick_ms` (skipped while paused).
/// 2. Fire every timer due at or before the new time, earliest first.
/// 3. Apply commands scheduled for this tick.
/// 4. Increment tick counter.
///
/// Timers fire before commands, so an assignment issued on the tick its
/// countdown reaches zero arrives after the timeout.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut SessionState,
    commands: &[CommandEnvelope],
    content: &GameContent,
    rng: &mut impl Rng,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();

    if !state.is_paused() {
        state.meta.now_ms += content.constants.tick_ms;
        fire_due_timers(state, content, rng, &mut events);
    }
    apply_commands(state, commands, content, rng, &mut events);

    state.meta.tick += 1;
    events
}

fn fire_due_timers(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let now = state.meta.now_ms;
    let constants = &content.constants;
    while let Some((_, kind)) = state.timers.pop_due(now) {
        match kind {
            TimerKind::Spawn => dispatch::spawn(state, content, rng, events),
            TimerKind::Request(train_id) => dispatch::request(state, constants, &train_id, events),
            TimerKind::CountdownTick(train_id) => {
                dispatch::countdown_tick(state, constants, &train_id, events);
            }
            TimerKind::Depart(train_id) => dispatch::depart(state, constants, &train_id, events),
        }
    }
}
