use crate::state::AppState;
use crate::tick_loop::log_transitions;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use conductor_core::{
    execute, Command, CommandOutcome, EventEnvelope, MetricsSnapshot, Phase, PlatformId,
    Rejection, TrainId,
};
use serde::Deserialize;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Router {
    let origin = cors_origin
        .parse::<axum::http::HeaderValue>()
        .unwrap_or_else(|_| axum::http::HeaderValue::from_static("http://localhost:5173"));
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/metrics", get(metrics_handler))
        .route("/api/v1/alerts", get(alerts_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/assign", post(assign_handler))
        .route("/api/v1/select", post(select_handler))
        .route("/api/v1/deselect", post(deselect_handler))
        .route("/api/v1/restart", post(restart_handler))
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    let meta = &sim.session.meta;
    let phase = match &sim.session.phase {
        Phase::Running => "running",
        Phase::Paused => "paused",
        Phase::GameOver { .. } => "game_over",
    };
    let operator = if sim.operator.is_some() {
        "autopilot"
    } else {
        "http"
    };
    Json(serde_json::json!({
        "tick": meta.tick,
        "now_ms": meta.now_ms,
        "seed": meta.seed,
        "session": meta.session,
        "content_version": meta.content_version,
        "ticks_per_sec": app_state.ticks_per_sec,
        "phase": phase,
        "paused": sim.session.is_paused(),
        "operator": operator,
    }))
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let sim = app_state.sim.lock();
    match serde_json::to_string(&sim.session) {
        Ok(json) => {
            drop(sim);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
        }
        Err(err) => {
            tracing::error!("snapshot serialization failed: {err}");
            drop(sim);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"serialization failed"}"#.to_string(),
            )
        }
    }
}

pub async fn metrics_handler(State(app_state): State<AppState>) -> Json<VecDeque<MetricsSnapshot>> {
    let sim = app_state.sim.lock();
    Json(sim.metrics_history.clone())
}

async fn alerts_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    Json(serde_json::json!({ "active_alerts": sim.alert_engine.active_alert_ids() }))
}

// ---------------------------------------------------------------------------
// Operator intents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub train_id: String,
    pub platform: u8,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub train_id: String,
}

/// Unknown trains and platforms are 404; every other refusal is a 409 conflict.
fn rejection_status(rejection: &Rejection) -> StatusCode {
    match rejection {
        Rejection::UnknownTrain { .. } | Rejection::UnknownPlatform { .. } => StatusCode::NOT_FOUND,
        Rejection::SessionOver | Rejection::Paused | Rejection::NotRequesting { .. } => {
            StatusCode::CONFLICT
        }
    }
}

/// Runs `command` against the live session at the current simulated instant and
/// broadcasts whatever it produced. The send happens under the session lock so
/// subscribers see batches in event-id order.
fn run_command(app_state: &AppState, command: &Command) -> (StatusCode, Json<serde_json::Value>) {
    let (result, tick) = {
        let mut guard = app_state.sim.lock();
        let sim = &mut *guard;
        let mut events: Vec<EventEnvelope> = Vec::new();
        let result = execute(
            &mut sim.session,
            command,
            &sim.content,
            &mut sim.rng,
            &mut events,
        );
        log_transitions(&events);
        if !events.is_empty() {
            let _ = app_state.event_tx.send(events);
        }
        (result, sim.session.meta.tick)
    };

    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome_body(&outcome, tick))),
        Err(rejection) => {
            tracing::debug!(code = rejection.code(), "operator command rejected: {rejection}");
            (
                rejection_status(&rejection),
                Json(serde_json::json!({
                    "error": rejection.code(),
                    "message": rejection.to_string(),
                })),
            )
        }
    }
}

fn outcome_body(outcome: &CommandOutcome, tick: u64) -> serde_json::Value {
    serde_json::json!({ "tick": tick, "outcome": outcome })
}

pub async fn assign_handler(
    State(app_state): State<AppState>,
    Json(request): Json<AssignRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    run_command(
        &app_state,
        &Command::Assign {
            train_id: TrainId(request.train_id),
            platform: PlatformId(request.platform),
        },
    )
}

pub async fn select_handler(
    State(app_state): State<AppState>,
    Json(request): Json<SelectRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    run_command(
        &app_state,
        &Command::SelectTrain {
            train_id: TrainId(request.train_id),
        },
    )
}

pub async fn deselect_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    run_command(&app_state, &Command::DeselectTrain)
}

pub async fn restart_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    run_command(&app_state, &Command::Restart)
}

pub async fn pause_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    run_command(&app_state, &Command::Pause)
}

pub async fn resume_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    run_command(&app_state, &Command::Resume)
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let sim = app_state.sim.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_millis(1000));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(50));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event stream subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let (tick, now_ms) = {
                        let guard = sim.lock();
                        (guard.session.meta.tick, guard.session.meta.now_ms)
                    };
                    let hb = serde_json::json!({"heartbeat": true, "tick": tick, "now_ms": now_ms});
                    yield Ok(Event::default().event("heartbeat").data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}
