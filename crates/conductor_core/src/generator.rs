//! Train generator: name/color pools and spawn scheduling.

use ahash::AHashSet;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::TimerKind;
use crate::{new_train_id, Constants, GameContent, SessionState, Train, TrainStatus};

/// Fixed name pool plus the set of names held by active trains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamePool {
    names: Vec<String>,
    in_use: AHashSet<String>,
}

impl NamePool {
    pub fn new(names: &[String]) -> Self {
        Self {
            names: names.to_vec(),
            in_use: AHashSet::new(),
        }
    }

    /// Draws uniformly among names not held by an active train and marks it in use.
    /// `None` when every name is taken.
    pub fn pick(&mut self, rng: &mut impl Rng) -> Option<String> {
        let free: Vec<&String> = self
            .names
            .iter()
            .filter(|name| !self.in_use.contains(*name))
            .collect();
        if free.is_empty() {
            return None;
        }
        let name = free[rng.gen_range(0..free.len())].clone();
        self.in_use.insert(name.clone());
        Some(name)
    }

    pub fn release(&mut self, name: &str) {
        self.in_use.remove(name);
    }

    /// Marks a specific name as held. Returns `false` if it is unknown or taken.
    pub fn claim(&mut self, name: &str) -> bool {
        if !self.names.iter().any(|n| n == name) {
            return false;
        }
        self.in_use.insert(name.to_string())
    }

    pub fn is_in_use(&self, name: &str) -> bool {
        self.in_use.contains(name)
    }

    pub fn available(&self) -> usize {
        self.names.len() - self.in_use.len()
    }

    pub fn capacity(&self) -> usize {
        self.names.len()
    }
}

/// Uniform over the palette; colors may repeat.
pub fn pick_color(palette: &[String], rng: &mut impl Rng) -> String {
    if palette.is_empty() {
        return String::from("#808080");
    }
    palette[rng.gen_range(0..palette.len())].clone()
}

/// Uniform delay in `[min_ms, max_ms]`.
pub fn random_delay(rng: &mut impl Rng, min_ms: u64, max_ms: u64) -> u64 {
    if max_ms <= min_ms {
        return min_ms;
    }
    rng.gen_range(min_ms..=max_ms)
}

/// Schedules the first spawn of a session.
pub fn start(state: &mut SessionState, constants: &Constants) {
    let due = state.meta.now_ms + constants.first_spawn_delay_ms;
    state.timers.schedule(due, TimerKind::Spawn);
}

/// Schedules the spawn after this one. Halts once the session has ended.
pub(crate) fn schedule_next_spawn(
    state: &mut SessionState,
    constants: &Constants,
    rng: &mut impl Rng,
) {
    if state.is_over() {
        return;
    }
    let delay = random_delay(
        rng,
        constants.spawn_interval_min_ms,
        constants.spawn_interval_max_ms,
    );
    state
        .timers
        .schedule(state.meta.now_ms + delay, TimerKind::Spawn);
}

/// Builds the next train in `Approaching`, or `None` if the name pool is exhausted.
pub(crate) fn next_train(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut impl Rng,
) -> Option<Train> {
    let name = state.names.pick(rng)?;
    let color = pick_color(&content.colors, rng);
    let id = new_train_id(rng);
    state.counters.trains_spawned += 1;
    Some(Train {
        id,
        name,
        color,
        status: TrainStatus::Approaching,
        assigned_platform: None,
        spawned_at_ms: state.meta.now_ms,
        requested_at_ms: None,
        pending_timer: None,
    })
}
