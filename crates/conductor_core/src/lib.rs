//! `conductor_core`: deterministic train-station dispatch simulation.
//!
//! No wall clock, no network. Time is simulated milliseconds advanced by
//! [`tick`]; all randomness via the passed-in Rng.

mod clock;
mod commands;
mod dispatch;
mod engine;
mod event_log;
mod generator;
mod id;
pub mod metrics;
mod observer;
mod platforms;
mod stats;
mod types;

pub use clock::{TimerId, TimerKind, TimerQueue};
pub use commands::{assign, deselect_train, execute, pause, restart, resume, select_train};
pub use engine::tick;
pub use event_log::{format_clock, EventLog, LogEntry, Severity};
pub use generator::{pick_color, random_delay, NamePool};
pub use id::{new_train_id, train_uuid};
pub use metrics::{compute_metrics, MetricsFileWriter, MetricsSnapshot};
pub use observer::{notify, DispatchObserver};
pub use platforms::{Platform, PlatformRegistry};
pub use stats::SessionStats;
pub use types::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub(crate) fn emit(counters: &mut Counters, meta: &MetaState, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope {
        id,
        tick: meta.tick,
        at_ms: meta.now_ms,
        event,
    }
}

/// Fresh session with all platforms free and nothing scheduled.
/// Call [`start_session`] to schedule the first arrival.
pub fn new_session(content: &GameContent, seed: u64) -> SessionState {
    let c = &content.constants;
    SessionState {
        meta: MetaState {
            tick: 0,
            now_ms: 0,
            seed,
            session: 1,
            session_started_ms: 0,
            schema_version: 1,
            content_version: content.content_version.clone(),
        },
        phase: Phase::Running,
        trains: Vec::new(),
        platforms: PlatformRegistry::new(c.platform_count),
        countdown: None,
        request_queue: std::collections::VecDeque::new(),
        selected_train: None,
        log: EventLog::new(c.log_capacity),
        stats: SessionStats::default(),
        score: 0,
        names: NamePool::new(&content.names),
        timers: TimerQueue::default(),
        counters: Counters {
            next_event_id: 0,
            next_command_id: 0,
            trains_spawned: 0,
        },
    }
}

/// Schedules the first spawn. Spawning then recurs until the session ends.
pub fn start_session(state: &mut SessionState, content: &GameContent) {
    generator::start(state, &content.constants);
}

#[cfg(test)]
mod tests;
