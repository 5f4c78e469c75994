use crate::alerts::AlertEngine;
use conductor_control::CommandSource;
use conductor_core::{EventEnvelope, GameContent, MetricsSnapshot, SessionState};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Samples kept for `/api/v1/metrics` and alert evaluation.
pub const METRICS_HISTORY_LEN: usize = 600;

pub struct SimState {
    pub session: SessionState,
    pub content: GameContent,
    pub rng: ChaCha8Rng,
    /// `None` when a human operator drives the station over HTTP.
    pub operator: Option<Box<dyn CommandSource + Send>>,
    pub next_command_id: u64,
    pub metrics_every: u64,
    pub metrics_history: VecDeque<MetricsSnapshot>,
    pub alert_engine: AlertEngine,
}

impl SimState {
    pub fn new(
        session: SessionState,
        content: GameContent,
        rng: ChaCha8Rng,
        operator: Option<Box<dyn CommandSource + Send>>,
        metrics_every: u64,
    ) -> Self {
        let alert_engine = AlertEngine::new(content.constants.near_miss_secs);
        Self {
            session,
            content,
            rng,
            operator,
            next_command_id: 0,
            metrics_every,
            metrics_history: VecDeque::with_capacity(METRICS_HISTORY_LEN),
            alert_engine,
        }
    }

    pub fn push_metrics(&mut self, snapshot: MetricsSnapshot) {
        if self.metrics_history.len() == METRICS_HISTORY_LEN {
            self.metrics_history.pop_front();
        }
        self.metrics_history.push_back(snapshot);
    }
}

pub type SharedSim = Arc<parking_lot::Mutex<SimState>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

#[derive(Clone)]
pub struct AppState {
    pub sim: SharedSim,
    pub event_tx: EventTx,
    pub ticks_per_sec: f64,
}
