//! Dispatch state machine.
//!
//! Train lifecycle: `Approaching → Requesting → Assigned → Departed`, with three
//! fatal exits (timeout, collision, overload) that end the session. Every
//! transition re-reads the train from `SessionState` by id when its timer
//! fires; nothing is captured at scheduling time except the id.

use rand::Rng;

use crate::clock::TimerKind;
use crate::event_log::{format_clock, LogEntry, Severity};
use crate::generator::{self, random_delay};
use crate::{
    emit, AssignOutcome, Constants, Countdown, Event, EventEnvelope, GameContent, GameOverCause,
    Phase, PlatformId, Rejection, SessionState, TrainId, TrainStatus,
};

// ---------------------------------------------------------------------------
// Notification helpers
// ---------------------------------------------------------------------------

pub(crate) fn push_event(state: &mut SessionState, events: &mut Vec<EventEnvelope>, event: Event) {
    events.push(emit(&mut state.counters, &state.meta, event));
}

fn log(
    state: &mut SessionState,
    events: &mut Vec<EventEnvelope>,
    severity: Severity,
    message: String,
) {
    let entry = LogEntry {
        timestamp: format_clock(state.meta.now_ms - state.meta.session_started_ms),
        at_ms: state.meta.now_ms,
        message,
        severity,
    };
    state.log.append(entry.clone());
    push_event(state, events, Event::LogAppended { entry });
}

fn stats_changed(state: &mut SessionState, events: &mut Vec<EventEnvelope>) {
    let stats = state.stats;
    push_event(state, events, Event::StatsChanged { stats });
}

fn award(state: &mut SessionState, events: &mut Vec<EventEnvelope>, delta: u64) {
    if delta == 0 {
        return;
    }
    state.score += delta;
    let total = state.score;
    push_event(state, events, Event::ScoreAwarded { delta, total });
}

fn platform_changed(state: &mut SessionState, events: &mut Vec<EventEnvelope>, id: PlatformId) {
    if let Some(platform) = state.platforms.get(id).cloned() {
        push_event(state, events, Event::PlatformChanged { platform });
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Spawn timer fired: bring in a new train and schedule the next arrival.
pub(crate) fn spawn(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    if state.is_over() {
        return;
    }
    let c = &content.constants;
    if let Some(mut train) = generator::next_train(state, content, rng) {
        let delay = random_delay(rng, c.request_delay_min_ms, c.request_delay_max_ms);
        let timer = state.timers.schedule(
            state.meta.now_ms + delay,
            TimerKind::Request(train.id.clone()),
        );
        train.pending_timer = Some(timer);
        let name = train.name.clone();
        state.trains.push(train.clone());
        push_event(state, events, Event::TrainSpawned { train });
        log(state, events, Severity::Info, format!("{name} approaching station..."));
    } else {
        let active_trains = u32::try_from(state.trains.len()).unwrap_or(u32::MAX);
        push_event(state, events, Event::SpawnSkipped { active_trains });
        log(
            state,
            events,
            Severity::Warning,
            "No train names free; arrival skipped this cycle".to_string(),
        );
    }
    generator::schedule_next_spawn(state, c, rng);
}

/// Request timer fired: the train asks for a platform.
pub(crate) fn request(
    state: &mut SessionState,
    constants: &Constants,
    train_id: &TrainId,
    events: &mut Vec<EventEnvelope>,
) {
    if state.is_over() {
        return;
    }
    let now = state.meta.now_ms;
    let Some(train) = state.train_mut(train_id) else {
        return;
    };
    if train.status != TrainStatus::Approaching {
        return;
    }
    train.status = TrainStatus::Requesting;
    train.requested_at_ms = Some(now);
    train.pending_timer = None;
    let name = train.name.clone();

    let queued = state.countdown.is_some();
    push_event(
        state,
        events,
        Event::TrainRequesting {
            train_id: train_id.clone(),
            queued,
        },
    );
    log(
        state,
        events,
        Severity::Warning,
        format!("{name} requesting platform assignment!"),
    );

    let requesting = u32::try_from(state.requesting_count()).unwrap_or(u32::MAX);
    if requesting >= constants.overload_threshold {
        end_session(state, GameOverCause::Overload { requesting }, events);
        return;
    }

    if queued {
        state.request_queue.push_back(train_id.clone());
    } else {
        start_countdown(state, constants, train_id, events);
    }
}

fn start_countdown(
    state: &mut SessionState,
    constants: &Constants,
    train_id: &TrainId,
    events: &mut Vec<EventEnvelope>,
) {
    let timer = state.timers.schedule(
        state.meta.now_ms + constants.countdown_interval_ms,
        TimerKind::CountdownTick(train_id.clone()),
    );
    state.countdown = Some(Countdown {
        train_id: train_id.clone(),
        seconds_left: constants.countdown_secs,
        timer,
    });
    push_event(
        state,
        events,
        Event::CountdownStarted {
            train_id: train_id.clone(),
            seconds_left: constants.countdown_secs,
        },
    );
}

/// Hands the countdown to the oldest queued train still requesting.
fn promote_next_request(
    state: &mut SessionState,
    constants: &Constants,
    events: &mut Vec<EventEnvelope>,
) {
    if state.countdown.is_some() {
        return;
    }
    while let Some(next) = state.request_queue.pop_front() {
        let still_requesting = state
            .train(&next)
            .is_some_and(|t| t.status == TrainStatus::Requesting);
        if still_requesting {
            start_countdown(state, constants, &next, events);
            return;
        }
    }
}

/// Countdown timer fired: one second less for the owning train.
pub(crate) fn countdown_tick(
    state: &mut SessionState,
    constants: &Constants,
    train_id: &TrainId,
    events: &mut Vec<EventEnvelope>,
) {
    if state.is_over() {
        return;
    }
    let Some(countdown) = state.countdown.as_mut() else {
        return;
    };
    if countdown.train_id != *train_id {
        return;
    }
    countdown.seconds_left = countdown.seconds_left.saturating_sub(1);
    let seconds_left = countdown.seconds_left;
    push_event(
        state,
        events,
        Event::CountdownTick {
            train_id: train_id.clone(),
            seconds_left,
        },
    );

    if seconds_left == 0 {
        timeout(state, train_id, events);
        return;
    }
    let timer = state.timers.schedule(
        state.meta.now_ms + constants.countdown_interval_ms,
        TimerKind::CountdownTick(train_id.clone()),
    );
    if let Some(countdown) = state.countdown.as_mut() {
        countdown.timer = timer;
    }
}

fn timeout(state: &mut SessionState, train_id: &TrainId, events: &mut Vec<EventEnvelope>) {
    let train_name = state
        .train(train_id)
        .map(|t| t.name.clone())
        .unwrap_or_default();
    end_session(
        state,
        GameOverCause::Timeout {
            train_id: train_id.clone(),
            train_name,
        },
        events,
    );
}

/// Operator assigns a requesting train to a platform.
pub(crate) fn assign(
    state: &mut SessionState,
    content: &GameContent,
    rng: &mut impl Rng,
    train_id: &TrainId,
    platform: PlatformId,
    events: &mut Vec<EventEnvelope>,
) -> Result<AssignOutcome, Rejection> {
    ensure_running(state)?;
    let train = state.train(train_id).ok_or_else(|| Rejection::UnknownTrain {
        train_id: train_id.clone(),
    })?;
    if train.status != TrainStatus::Requesting {
        return Err(Rejection::NotRequesting {
            train_id: train_id.clone(),
            status: train.status,
        });
    }
    if !state.platforms.contains(platform) {
        return Err(Rejection::UnknownPlatform { platform });
    }
    let train_name = train.name.clone();

    if state.platforms.is_occupied(platform) {
        let cause = GameOverCause::Collision {
            train_id: train_id.clone(),
            train_name,
            platform,
        };
        end_session(state, cause.clone(), events);
        return Ok(AssignOutcome::Collision { cause });
    }

    let c = &content.constants;
    let seconds_left = release_request(state, train_id);
    let near_miss = seconds_left.is_some_and(|s| s <= c.near_miss_secs);

    state.platforms.occupy(platform, train_id.clone());
    platform_changed(state, events, platform);

    let delay = random_delay(rng, c.departure_delay_min_ms, c.departure_delay_max_ms);
    let timer = state
        .timers
        .schedule(state.meta.now_ms + delay, TimerKind::Depart(train_id.clone()));
    if let Some(train) = state.train_mut(train_id) {
        train.status = TrainStatus::Assigned;
        train.assigned_platform = Some(platform);
        train.pending_timer = Some(timer);
    }

    state.stats.record_assignment(near_miss);
    stats_changed(state, events);
    push_event(
        state,
        events,
        Event::PlatformAssigned {
            train_id: train_id.clone(),
            platform,
            near_miss,
        },
    );
    match seconds_left.filter(|_| near_miss) {
        Some(left) => {
            log(
                state,
                events,
                Severity::Warning,
                format!("Near miss! {train_name} assigned to {platform} with {left}s to spare"),
            );
            award(state, events, c.score_per_assignment + c.score_near_miss_bonus);
        }
        None => {
            log(
                state,
                events,
                Severity::Success,
                format!("{train_name} assigned to {platform}"),
            );
            award(state, events, c.score_per_assignment);
        }
    }
    clear_selection_of(state, train_id, events);
    promote_next_request(state, c, events);

    Ok(AssignOutcome::Assigned {
        train_id: train_id.clone(),
        platform,
        near_miss,
        seconds_left,
    })
}

/// Takes the train out of the request pipeline. If it owned the countdown,
/// the countdown timer is cancelled and its value at this instant returned.
fn release_request(state: &mut SessionState, train_id: &TrainId) -> Option<u32> {
    let owns_countdown = matches!(&state.countdown, Some(c) if c.train_id == *train_id);
    if owns_countdown {
        let countdown = state.countdown.take()?;
        state.timers.cancel(countdown.timer);
        Some(countdown.seconds_left)
    } else {
        state.request_queue.retain(|queued| queued != train_id);
        None
    }
}

/// Departure timer fired: free the platform and retire the train.
pub(crate) fn depart(
    state: &mut SessionState,
    constants: &Constants,
    train_id: &TrainId,
    events: &mut Vec<EventEnvelope>,
) {
    if state.is_over() {
        return;
    }
    let Some(index) = state.trains.iter().position(|t| t.id == *train_id) else {
        return;
    };
    let (TrainStatus::Assigned, Some(platform)) = (
        state.trains[index].status,
        state.trains[index].assigned_platform,
    ) else {
        return;
    };
    let mut train = state.trains.remove(index);
    train.status = TrainStatus::Departed;
    train.pending_timer = None;

    state.platforms.free(platform);
    platform_changed(state, events, platform);
    state.names.release(&train.name);

    state.stats.record_departure();
    stats_changed(state, events);
    log(
        state,
        events,
        Severity::Info,
        format!("{} departed from {platform}", train.name),
    );
    push_event(
        state,
        events,
        Event::TrainDeparted {
            train_id: train.id.clone(),
            name: train.name,
            platform,
        },
    );
    award(state, events, constants.score_per_departure);
    clear_selection_of(state, train_id, events);
}

fn clear_selection_of(state: &mut SessionState, train_id: &TrainId, events: &mut Vec<EventEnvelope>) {
    if state.selected_train.as_ref() == Some(train_id) {
        state.selected_train = None;
        push_event(state, events, Event::TrainDeselected);
    }
}

// ---------------------------------------------------------------------------
// Session control
// ---------------------------------------------------------------------------

pub(crate) fn ensure_running(state: &SessionState) -> Result<(), Rejection> {
    match state.phase {
        Phase::Running => Ok(()),
        Phase::Paused => Err(Rejection::Paused),
        Phase::GameOver { .. } => Err(Rejection::SessionOver),
    }
}

/// Terminal transition. Cancels every pending timer so nothing scheduled in
/// this session can fire afterwards.
pub(crate) fn end_session(
    state: &mut SessionState,
    cause: GameOverCause,
    events: &mut Vec<EventEnvelope>,
) {
    state.timers.cancel_all();
    state.countdown = None;
    state.request_queue.clear();
    state.selected_train = None;
    for train in &mut state.trains {
        train.pending_timer = None;
    }
    state.phase = Phase::GameOver {
        cause: cause.clone(),
    };
    log(state, events, Severity::Error, format!("Game over: {cause}"));
    push_event(state, events, Event::GameOver { cause });
}

/// Reinitializes the session in place and resumes spawning. Observers get the
/// freed platforms and the zeroed stats after `SessionRestarted`.
pub(crate) fn restart(
    state: &mut SessionState,
    content: &GameContent,
    events: &mut Vec<EventEnvelope>,
) {
    let c = &content.constants;
    let freed: Vec<PlatformId> = state
        .platforms
        .iter()
        .filter(|p| p.is_occupied())
        .map(|p| p.id)
        .collect();
    state.timers.cancel_all();
    state.meta.session += 1;
    state.meta.session_started_ms = state.meta.now_ms;
    state.phase = Phase::Running;
    state.trains.clear();
    state.platforms = crate::PlatformRegistry::new(c.platform_count);
    state.countdown = None;
    state.request_queue.clear();
    state.selected_train = None;
    state.log = crate::EventLog::new(c.log_capacity);
    state.stats = crate::SessionStats::default();
    state.score = 0;
    state.names = crate::NamePool::new(&content.names);

    let session = state.meta.session;
    push_event(state, events, Event::SessionRestarted { session });
    for id in freed {
        platform_changed(state, events, id);
    }
    stats_changed(state, events);
    generator::start(state, c);
}
