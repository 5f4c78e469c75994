use super::*;
use crate::test_fixtures::{
    base_content, base_state, insert_train, make_rng, requesting_train, run_ticks, started_state,
    ticks_per_second,
};
use rand_chacha::ChaCha8Rng;

mod commands;

// --- Shared test helpers ------------------------------------------------

fn assign_now(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut ChaCha8Rng,
    train_id: &TrainId,
    platform: u8,
) -> Result<AssignOutcome, Rejection> {
    let mut events = Vec::new();
    assign(state, train_id, PlatformId(platform), content, rng, &mut events)
}

fn command_now(state: &SessionState, command: Command) -> CommandEnvelope {
    CommandEnvelope {
        id: CommandId(format!("cmd_{:06}", state.meta.tick)),
        issued_tick: state.meta.tick,
        execute_at_tick: state.meta.tick,
        command,
    }
}

/// Ticks until the current countdown has `seconds_left` remaining.
fn run_until_countdown(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut ChaCha8Rng,
    seconds_left: u32,
) {
    for _ in 0..10_000 {
        if state.countdown_seconds() == Some(seconds_left) {
            return;
        }
        tick(state, &[], content, rng);
    }
    panic!("countdown never reached {seconds_left}");
}

fn has_event(events: &[EventEnvelope], pred: impl Fn(&Event) -> bool) -> bool {
    events.iter().any(|e| pred(&e.event))
}

/// A platform is occupied iff exactly one `Assigned` train names it.
fn assert_platform_invariant(state: &SessionState) {
    for platform in state.platforms.iter() {
        let holders: Vec<&Train> = state
            .trains
            .iter()
            .filter(|t| t.status == TrainStatus::Assigned && t.assigned_platform == Some(platform.id))
            .collect();
        if platform.is_occupied() {
            assert_eq!(holders.len(), 1, "{} occupied by {:?}", platform.id, holders);
            assert_eq!(platform.occupant.as_ref(), Some(&holders[0].id));
        } else {
            assert!(holders.is_empty(), "{} free but held by {:?}", platform.id, holders);
        }
    }
    for train in &state.trains {
        assert_eq!(
            train.assigned_platform.is_some(),
            train.status == TrainStatus::Assigned,
            "assigned_platform must be present iff Assigned: {train:?}"
        );
    }
}

/// Ticks once, then sends every requesting train to the lowest free platform.
fn autopilot_tick(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut ChaCha8Rng,
) -> Vec<EventEnvelope> {
    let mut events = tick(state, &[], content, rng);
    if state.is_over() {
        return events;
    }
    let requesting: Vec<TrainId> = state
        .trains
        .iter()
        .filter(|t| t.status == TrainStatus::Requesting)
        .map(|t| t.id.clone())
        .collect();
    for id in requesting {
        let Some(free) = state.platforms.list_available().first().copied() else {
            break;
        };
        assign(state, &id, free, content, rng, &mut events).unwrap();
    }
    events
}
