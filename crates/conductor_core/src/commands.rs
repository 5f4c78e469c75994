//! Operator intents. The presentation layer never mutates `SessionState`
//! directly; it submits one of these and gets an outcome or a [`Rejection`].

use rand::Rng;

use crate::dispatch::{self, push_event};
use crate::{
    AssignOutcome, Command, CommandEnvelope, CommandOutcome, Event, EventEnvelope, GameContent,
    Phase, PlatformId, Rejection, SessionState, TrainId,
};

/// Runs one command at the current simulated instant.
pub fn execute(
    state: &mut SessionState,
    command: &Command,
    content: &GameContent,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Result<CommandOutcome, Rejection> {
    match command {
        Command::Assign { train_id, platform } => {
            assign(state, train_id, *platform, content, rng, events).map(CommandOutcome::Assign)
        }
        Command::SelectTrain { train_id } => select_train(state, train_id, events),
        Command::DeselectTrain => Ok(deselect_train(state, events)),
        Command::Restart => Ok(restart(state, content, events)),
        Command::Pause => pause(state, events),
        Command::Resume => resume(state, events),
    }
}

pub(crate) fn apply_commands(
    state: &mut SessionState,
    commands: &[CommandEnvelope],
    content: &GameContent,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let current_tick = state.meta.tick;
    for envelope in commands {
        if envelope.execute_at_tick != current_tick {
            continue;
        }
        if let Err(rejection) = execute(state, &envelope.command, content, rng, events) {
            push_event(
                state,
                events,
                Event::CommandRejected {
                    command_id: envelope.id.clone(),
                    rejection,
                },
            );
        }
    }
}

/// Assign `train_id` to `platform`. An occupied platform is a collision and
/// ends the session; that is reported as `Ok(AssignOutcome::Collision)`.
pub fn assign(
    state: &mut SessionState,
    train_id: &TrainId,
    platform: PlatformId,
    content: &GameContent,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Result<AssignOutcome, Rejection> {
    dispatch::assign(state, content, rng, train_id, platform, events)
}

pub fn select_train(
    state: &mut SessionState,
    train_id: &TrainId,
    events: &mut Vec<EventEnvelope>,
) -> Result<CommandOutcome, Rejection> {
    if state.is_over() {
        return Err(Rejection::SessionOver);
    }
    if state.train(train_id).is_none() {
        return Err(Rejection::UnknownTrain {
            train_id: train_id.clone(),
        });
    }
    state.selected_train = Some(train_id.clone());
    push_event(
        state,
        events,
        Event::TrainSelected {
            train_id: train_id.clone(),
        },
    );
    Ok(CommandOutcome::Selected(train_id.clone()))
}

pub fn deselect_train(state: &mut SessionState, events: &mut Vec<EventEnvelope>) -> CommandOutcome {
    if state.selected_train.take().is_some() {
        push_event(state, events, Event::TrainDeselected);
    }
    CommandOutcome::Deselected
}

/// Always succeeds: cancels every pending timer and starts a fresh session.
pub fn restart(
    state: &mut SessionState,
    content: &GameContent,
    events: &mut Vec<EventEnvelope>,
) -> CommandOutcome {
    dispatch::restart(state, content, events);
    CommandOutcome::Restarted
}

pub fn pause(
    state: &mut SessionState,
    events: &mut Vec<EventEnvelope>,
) -> Result<CommandOutcome, Rejection> {
    match state.phase {
        Phase::GameOver { .. } => Err(Rejection::SessionOver),
        Phase::Paused => Ok(CommandOutcome::Paused),
        Phase::Running => {
            state.phase = Phase::Paused;
            push_event(state, events, Event::Paused);
            Ok(CommandOutcome::Paused)
        }
    }
}

pub fn resume(
    state: &mut SessionState,
    events: &mut Vec<EventEnvelope>,
) -> Result<CommandOutcome, Rejection> {
    match state.phase {
        Phase::GameOver { .. } => Err(Rejection::SessionOver),
        Phase::Running => Ok(CommandOutcome::Resumed),
        Phase::Paused => {
            state.phase = Phase::Running;
            push_event(state, events, Event::Resumed);
            Ok(CommandOutcome::Resumed)
        }
    }
}
