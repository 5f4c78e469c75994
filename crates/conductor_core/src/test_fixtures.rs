//! Shared test fixtures for conductor_core and downstream crates.
//!
//! `base_content()` uses the production timings (8 s countdown, 4 platforms,
//! 20-entry log). `base_state()` is a session that has not started spawning, so
//! tests can bring in trains by name with [`insert_train`].

use crate::clock::TimerKind;
use crate::{
    new_session, start_session, tick, Constants, EventEnvelope, GameContent, SessionState, Train,
    TrainId, TrainStatus,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const TRAIN_NAMES: &[&str] = &[
    "Thunder Zeta",
    "Comet Mu",
    "Silver Arrow",
    "Night Owl",
    "Iron Horse",
    "Blue Falcon",
    "Star Runner",
    "Red Kite",
];

pub fn base_constants() -> Constants {
    Constants {
        tick_ms: 100,
        first_spawn_delay_ms: 2000,
        spawn_interval_min_ms: 5000,
        spawn_interval_max_ms: 8000,
        request_delay_min_ms: 3000,
        request_delay_max_ms: 5000,
        departure_delay_min_ms: 4000,
        departure_delay_max_ms: 6000,
        countdown_interval_ms: 1000,
        countdown_secs: 8,
        near_miss_secs: 2,
        overload_threshold: 4,
        platform_count: 4,
        log_capacity: 20,
        score_per_assignment: 20,
        score_near_miss_bonus: 10,
        score_per_departure: 100,
    }
}

pub fn base_content() -> GameContent {
    GameContent {
        content_version: "test".to_string(),
        names: TRAIN_NAMES.iter().map(ToString::to_string).collect(),
        colors: vec![
            "#5865F2".to_string(),
            "#43B581".to_string(),
            "#FAA61A".to_string(),
            "#F04747".to_string(),
        ],
        constants: base_constants(),
    }
}

/// Session with nothing scheduled.
pub fn base_state(content: &GameContent) -> SessionState {
    new_session(content, 42)
}

/// Session with the first spawn scheduled.
pub fn started_state(content: &GameContent) -> SessionState {
    let mut state = new_session(content, 42);
    start_session(&mut state, content);
    state
}

/// Deterministic RNG seeded with 42.
pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

/// Engine ticks per simulated second.
pub fn ticks_per_second(content: &GameContent) -> u64 {
    1000 / content.constants.tick_ms
}

/// Adds an `Approaching` train with the given pool name whose request fires on
/// the next tick. Panics if the name is unknown or already in use.
pub fn insert_train(state: &mut SessionState, name: &str) -> TrainId {
    assert!(state.names.claim(name), "name '{name}' unavailable");
    let id = TrainId(format!("train_{}", name.to_lowercase().replace(' ', "_")));
    let timer = state
        .timers
        .schedule(state.meta.now_ms, TimerKind::Request(id.clone()));
    state.trains.push(Train {
        id: id.clone(),
        name: name.to_string(),
        color: "#5865F2".to_string(),
        status: TrainStatus::Approaching,
        assigned_platform: None,
        spawned_at_ms: state.meta.now_ms,
        requested_at_ms: None,
        pending_timer: Some(timer),
    });
    id
}

/// Inserts a train and ticks once so it is `Requesting`.
pub fn requesting_train(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut ChaCha8Rng,
    name: &str,
) -> TrainId {
    let id = insert_train(state, name);
    tick(state, &[], content, rng);
    id
}

/// Runs `n` ticks with no commands and returns every event produced.
pub fn run_ticks(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut ChaCha8Rng,
    n: u64,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    for _ in 0..n {
        events.extend(tick(state, &[], content, rng));
    }
    events
}
