//! Type definitions for `conductor_core`.
//!
//! Session state, trains, commands, events, and content types used by the
//! dispatch simulation. Service types with their own behavior (timer queue,
//! platform registry, event log, name pool, stats) live in their modules.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::clock::{TimerId, TimerQueue};
use crate::event_log::{EventLog, LogEntry, Severity};
use crate::generator::NamePool;
use crate::platforms::{Platform, PlatformRegistry};
use crate::stats::SessionStats;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(TrainId);
string_id!(CommandId);
string_id!(EventId);

/// Platform numbers start at 1, matching the station signage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformId(pub u8);

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Platform {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Train
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainStatus {
    Approaching,
    Requesting,
    Assigned,
    /// Transient: a departed train is dropped from the active set in the same step.
    Departed,
}

impl TrainStatus {
    pub fn label(self) -> &'static str {
        match self {
            TrainStatus::Approaching => "approaching",
            TrainStatus::Requesting => "requesting",
            TrainStatus::Assigned => "assigned",
            TrainStatus::Departed => "departed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Train {
    pub id: TrainId,
    pub name: String,
    pub color: String,
    pub status: TrainStatus,
    /// Present iff `status == Assigned`.
    pub assigned_platform: Option<PlatformId>,
    pub spawned_at_ms: u64,
    pub requested_at_ms: Option<u64>,
    /// The request or departure timer this train is waiting on, if any.
    pub pending_timer: Option<TimerId>,
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    /// Simulated milliseconds since the simulation was created. Not reset on restart.
    pub now_ms: u64,
    pub seed: u64,
    /// Incremented by every restart.
    pub session: u32,
    /// `now_ms` at which the current session began.
    pub session_started_ms: u64,
    pub schema_version: u32,
    pub content_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_command_id: u64,
    pub trains_spawned: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Running,
    Paused,
    GameOver { cause: GameOverCause },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameOverCause {
    Timeout {
        train_id: TrainId,
        train_name: String,
    },
    Collision {
        train_id: TrainId,
        train_name: String,
        platform: PlatformId,
    },
    Overload {
        requesting: u32,
    },
}

impl GameOverCause {
    pub fn kind(&self) -> &'static str {
        match self {
            GameOverCause::Timeout { .. } => "timeout",
            GameOverCause::Collision { .. } => "collision",
            GameOverCause::Overload { .. } => "overload",
        }
    }

    /// Name of the train the cause is attributed to, if any.
    pub fn train_name(&self) -> Option<&str> {
        match self {
            GameOverCause::Timeout { train_name, .. }
            | GameOverCause::Collision { train_name, .. } => Some(train_name),
            GameOverCause::Overload { .. } => None,
        }
    }
}

impl std::fmt::Display for GameOverCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameOverCause::Timeout { train_name, .. } => {
                write!(f, "{train_name} collided due to missing platform assignment")
            }
            GameOverCause::Collision {
                train_name,
                platform,
                ..
            } => write!(f, "{train_name} collided on {platform}, which was already occupied"),
            GameOverCause::Overload { requesting } => write!(
                f,
                "System overload: {requesting} trains requesting platforms at once"
            ),
        }
    }
}

/// The single visible countdown. Only the oldest requesting train owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Countdown {
    pub train_id: TrainId,
    pub seconds_left: u32,
    pub timer: TimerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub meta: MetaState,
    pub phase: Phase,
    /// Active trains in spawn order.
    pub trains: Vec<Train>,
    pub platforms: PlatformRegistry,
    pub countdown: Option<Countdown>,
    /// Requesting trains waiting for the countdown, oldest first.
    pub request_queue: VecDeque<TrainId>,
    /// Operator's tentative assignment target. Presentation-only.
    pub selected_train: Option<TrainId>,
    pub log: EventLog,
    pub stats: SessionStats,
    pub score: u64,
    pub names: NamePool,
    #[serde(skip)]
    pub timers: TimerQueue,
    pub counters: Counters,
}

impl SessionState {
    pub fn train(&self, id: &TrainId) -> Option<&Train> {
        self.trains.iter().find(|t| &t.id == id)
    }

    pub(crate) fn train_mut(&mut self, id: &TrainId) -> Option<&mut Train> {
        self.trains.iter_mut().find(|t| &t.id == id)
    }

    pub fn train_by_name(&self, name: &str) -> Option<&Train> {
        self.trains.iter().find(|t| t.name == name)
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::GameOver { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, Phase::Paused)
    }

    pub fn game_over_cause(&self) -> Option<&GameOverCause> {
        match &self.phase {
            Phase::GameOver { cause } => Some(cause),
            Phase::Running | Phase::Paused => None,
        }
    }

    pub fn requesting_count(&self) -> usize {
        self.trains
            .iter()
            .filter(|t| t.status == TrainStatus::Requesting)
            .count()
    }

    /// Seconds left on the visible countdown, if one is running.
    pub fn countdown_seconds(&self) -> Option<u32> {
        self.countdown.as_ref().map(|c| c.seconds_left)
    }
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_tick: u64,
    pub execute_at_tick: u64,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Assign {
        train_id: TrainId,
        platform: PlatformId,
    },
    SelectTrain {
        train_id: TrainId,
    },
    DeselectTrain,
    Restart,
    Pause,
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignOutcome {
    Assigned {
        train_id: TrainId,
        platform: PlatformId,
        near_miss: bool,
        /// Countdown value at the moment of assignment; `None` for a queued train.
        seconds_left: Option<u32>,
    },
    Collision {
        cause: GameOverCause,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Assign(AssignOutcome),
    Selected(TrainId),
    Deselected,
    Restarted,
    Paused,
    Resumed,
}

/// Reason an operator intent was refused. The session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    SessionOver,
    Paused,
    UnknownTrain { train_id: TrainId },
    NotRequesting { train_id: TrainId, status: TrainStatus },
    UnknownPlatform { platform: PlatformId },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::SessionOver => "session_over",
            Rejection::Paused => "paused",
            Rejection::UnknownTrain { .. } => "unknown_train",
            Rejection::NotRequesting { .. } => "not_requesting",
            Rejection::UnknownPlatform { .. } => "unknown_platform",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::SessionOver => f.write_str("the session is over; restart to play again"),
            Rejection::Paused => f.write_str("the simulation is paused"),
            Rejection::UnknownTrain { train_id } => write!(f, "no active train {train_id}"),
            Rejection::NotRequesting { train_id, status } => write!(
                f,
                "train {train_id} is {} and not requesting a platform",
                status.label()
            ),
            Rejection::UnknownPlatform { platform } => write!(f, "no such platform: {platform}"),
        }
    }
}

impl std::error::Error for Rejection {}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub at_ms: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    TrainSpawned {
        train: Train,
    },
    /// Name pool exhausted; no train this cycle.
    SpawnSkipped {
        active_trains: u32,
    },
    TrainRequesting {
        train_id: TrainId,
        queued: bool,
    },
    CountdownStarted {
        train_id: TrainId,
        seconds_left: u32,
    },
    CountdownTick {
        train_id: TrainId,
        seconds_left: u32,
    },
    PlatformAssigned {
        train_id: TrainId,
        platform: PlatformId,
        near_miss: bool,
    },
    TrainDeparted {
        train_id: TrainId,
        name: String,
        platform: PlatformId,
    },
    PlatformChanged {
        platform: Platform,
    },
    LogAppended {
        entry: LogEntry,
    },
    StatsChanged {
        stats: SessionStats,
    },
    ScoreAwarded {
        delta: u64,
        total: u64,
    },
    TrainSelected {
        train_id: TrainId,
    },
    TrainDeselected,
    GameOver {
        cause: GameOverCause,
    },
    SessionRestarted {
        session: u32,
    },
    Paused,
    Resumed,
    CommandRejected {
        command_id: CommandId,
        rejection: Rejection,
    },
    /// Raised by a metrics-driven alert engine outside the tick.
    AlertRaised {
        alert_id: String,
        severity: Severity,
        message: String,
        suggested_action: String,
    },
    AlertCleared {
        alert_id: String,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContent {
    pub content_version: String,
    /// Fixed pool of train names. Drawn without replacement among active trains.
    pub names: Vec<String>,
    pub colors: Vec<String>,
    pub constants: Constants,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    /// Simulated milliseconds per engine tick.
    pub tick_ms: u64,
    pub first_spawn_delay_ms: u64,
    pub spawn_interval_min_ms: u64,
    pub spawn_interval_max_ms: u64,
    pub request_delay_min_ms: u64,
    pub request_delay_max_ms: u64,
    pub departure_delay_min_ms: u64,
    pub departure_delay_max_ms: u64,
    pub countdown_interval_ms: u64,
    pub countdown_secs: u32,
    /// Assignments made with this many seconds left or fewer count as near misses.
    pub near_miss_secs: u32,
    /// Requesting trains at which the session fails with an overload.
    pub overload_threshold: u32,
    pub platform_count: u8,
    pub log_capacity: usize,
    pub score_per_assignment: u64,
    pub score_near_miss_bonus: u64,
    pub score_per_departure: u64,
}
