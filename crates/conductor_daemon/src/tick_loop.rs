use crate::state::{EventTx, SharedSim, SimState};
use conductor_core::{compute_metrics, Event, EventEnvelope};
use std::time::Duration;

/// Advances the shared session once. Returns the events of this tick plus any
/// alert transitions triggered by the metrics sample.
pub fn step(sim: &mut SimState) -> Vec<EventEnvelope> {
    let commands = match sim.operator.as_mut() {
        Some(operator) => {
            operator.generate_commands(&sim.session, &sim.content, &mut sim.next_command_id)
        }
        None => Vec::new(),
    };
    let mut events = conductor_core::tick(&mut sim.session, &commands, &sim.content, &mut sim.rng);
    log_transitions(&events);

    let metrics_every = sim.metrics_every;
    if metrics_every > 0 && sim.session.meta.tick % metrics_every == 0 {
        let snapshot = compute_metrics(&sim.session);
        sim.push_metrics(snapshot);
        events.extend(sim.alert_engine.evaluate(
            &sim.metrics_history,
            &sim.session.meta,
            &mut sim.session.counters,
        ));
    }
    events
}

pub(crate) fn log_transitions(events: &[EventEnvelope]) {
    for envelope in events {
        match &envelope.event {
            Event::GameOver { cause } => {
                tracing::warn!(tick = envelope.tick, kind = cause.kind(), "game over: {cause}");
            }
            Event::SessionRestarted { session } => {
                tracing::info!(tick = envelope.tick, session, "session restarted");
            }
            Event::AlertRaised { alert_id, .. } => {
                tracing::info!(tick = envelope.tick, %alert_id, "alert raised");
            }
            _ => {}
        }
    }
}

pub async fn run_tick_loop(
    sim: SharedSim,
    event_tx: EventTx,
    ticks_per_sec: f64,
    max_ticks: Option<u64>,
) {
    let mut interval = if ticks_per_sec > 0.0 {
        let mut iv = tokio::time::interval(Duration::from_secs_f64(1.0 / ticks_per_sec));
        iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
        Some(iv)
    } else {
        None
    };

    loop {
        let done = {
            let mut guard = sim.lock();
            let events = step(&mut guard);
            // Sent under the lock: HTTP commands interleave with ticks.
            let _ = event_tx.send(events);
            max_ticks.is_some_and(|max| guard.session.meta.tick >= max)
        };

        if done {
            tracing::info!("max ticks reached; tick loop stopped");
            break;
        }

        if let Some(ref mut iv) = interval {
            iv.tick().await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}
