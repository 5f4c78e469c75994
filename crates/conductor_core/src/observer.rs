//! Observer contract for the presentation layer.
//!
//! The engine returns plain events; [`notify`] replays them onto an observer
//! so a UI can subscribe to only the callbacks it renders.

use crate::{Event, EventEnvelope, GameOverCause, LogEntry, Platform, SessionStats, Train, TrainId};

#[allow(unused_variables)]
pub trait DispatchObserver {
    fn on_spawn(&mut self, train: &Train) {}
    fn on_log_appended(&mut self, entry: &LogEntry) {}
    fn on_stats_changed(&mut self, stats: &SessionStats) {}
    /// Also called with the starting value when a countdown begins.
    fn on_countdown_tick(&mut self, train_id: &TrainId, seconds_left: u32) {}
    fn on_game_over(&mut self, cause: &GameOverCause) {}
    fn on_platform_changed(&mut self, platform: &Platform) {}
    /// Score delta for an external scoreboard.
    fn on_score(&mut self, delta: u64, total: u64) {}
    /// A new session began; platform and stats callbacks for the reset follow.
    fn on_restart(&mut self, session: u32) {}
}

pub fn notify(observer: &mut impl DispatchObserver, events: &[EventEnvelope]) {
    for envelope in events {
        match &envelope.event {
            Event::TrainSpawned { train } => observer.on_spawn(train),
            Event::LogAppended { entry } => observer.on_log_appended(entry),
            Event::StatsChanged { stats } => observer.on_stats_changed(stats),
            Event::CountdownStarted {
                train_id,
                seconds_left,
            }
            | Event::CountdownTick {
                train_id,
                seconds_left,
            } => observer.on_countdown_tick(train_id, *seconds_left),
            Event::GameOver { cause } => observer.on_game_over(cause),
            Event::PlatformChanged { platform } => observer.on_platform_changed(platform),
            Event::ScoreAwarded { delta, total } => observer.on_score(*delta, *total),
            Event::SessionRestarted { session } => observer.on_restart(*session),
            _ => {}
        }
    }
}
