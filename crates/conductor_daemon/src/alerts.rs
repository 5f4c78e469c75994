use conductor_core::{Counters, Event, EventEnvelope, EventId, MetaState, MetricsSnapshot, Severity};
use std::collections::{BTreeSet, VecDeque};

type RuleFn = fn(&VecDeque<MetricsSnapshot>, &AlertEngine) -> bool;

struct AlertRule {
    id: &'static str,
    severity: Severity,
    check: RuleFn,
    message: &'static str,
    suggested_action: &'static str,
}

const RULES: &[AlertRule] = &[
    AlertRule {
        id: "PLATFORMS_SATURATED",
        severity: Severity::Warning,
        check: |h, _| {
            latest(h).is_some_and(|s| s.platforms_total > 0 && s.platforms_occupied == s.platforms_total)
        },
        message: "Every platform is occupied",
        suggested_action: "Hold new assignments until a train departs",
    },
    AlertRule {
        id: "REQUEST_QUEUE_BUILDING",
        severity: Severity::Warning,
        check: |h, _| latest(h).is_some_and(|s| s.requesting >= 2),
        message: "Two or more trains are waiting for a platform",
        suggested_action: "Assign queued trains before the backlog overloads the station",
    },
    AlertRule {
        id: "COUNTDOWN_CRITICAL",
        severity: Severity::Error,
        check: |h, engine| {
            latest(h).is_some_and(|s| {
                s.countdown_active && s.countdown_seconds_left <= engine.near_miss_secs
            })
        },
        message: "Countdown is inside the near-miss window",
        suggested_action: "Assign the requesting train to a free platform now",
    },
    AlertRule {
        id: "NEAR_MISS_STREAK",
        severity: Severity::Warning,
        check: |h, _| {
            let Some(current) = latest(h) else {
                return false;
            };
            let session: Vec<&MetricsSnapshot> = tail(h, 30)
                .into_iter()
                .filter(|s| s.session == current.session)
                .collect();
            if session.len() < 2 {
                return false;
            }
            max_u(&session, |s| s.near_misses) - min_u(&session, |s| s.near_misses) >= 2
        },
        message: "Several near misses in quick succession",
        suggested_action: "React earlier to platform requests",
    },
];

// --- Helpers for querying recent snapshots ---

fn latest(h: &VecDeque<MetricsSnapshot>) -> Option<&MetricsSnapshot> {
    h.back()
}

fn tail(h: &VecDeque<MetricsSnapshot>, n: usize) -> Vec<&MetricsSnapshot> {
    h.iter().rev().take(n).collect()
}

fn max_u(snapshots: &[&MetricsSnapshot], f: fn(&MetricsSnapshot) -> u32) -> u32 {
    snapshots.iter().map(|s| f(s)).max().unwrap_or(0)
}

fn min_u(snapshots: &[&MetricsSnapshot], f: fn(&MetricsSnapshot) -> u32) -> u32 {
    snapshots.iter().map(|s| f(s)).min().unwrap_or(0)
}

// --- AlertEngine ---

pub struct AlertEngine {
    active: BTreeSet<String>,
    near_miss_secs: u32,
}

impl AlertEngine {
    pub fn new(near_miss_secs: u32) -> Self {
        Self {
            active: BTreeSet::new(),
            near_miss_secs,
        }
    }

    /// Current active alert IDs, sorted (for the /api/v1/alerts endpoint).
    pub fn active_alert_ids(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    /// Evaluate all rules against recent metrics history. Returns events for state changes.
    pub fn evaluate(
        &mut self,
        history: &VecDeque<MetricsSnapshot>,
        meta: &MetaState,
        counters: &mut Counters,
    ) -> Vec<EventEnvelope> {
        let mut events = Vec::new();

        for rule in RULES {
            let fired = (rule.check)(history, self);
            let was_active = self.active.contains(rule.id);

            if fired && !was_active {
                self.active.insert(rule.id.to_string());
                events.push(make_envelope(
                    counters,
                    meta,
                    Event::AlertRaised {
                        alert_id: rule.id.to_string(),
                        severity: rule.severity,
                        message: rule.message.to_string(),
                        suggested_action: rule.suggested_action.to_string(),
                    },
                ));
            } else if !fired && was_active {
                self.active.remove(rule.id);
                events.push(make_envelope(
                    counters,
                    meta,
                    Event::AlertCleared {
                        alert_id: rule.id.to_string(),
                    },
                ));
            }
        }

        events
    }
}

fn make_envelope(counters: &mut Counters, meta: &MetaState, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope {
        id,
        tick: meta.tick,
        at_ms: meta.now_ms,
        event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::compute_metrics;
    use conductor_core::test_fixtures::{base_content, base_state};

    fn empty_snapshot(tick: u64) -> MetricsSnapshot {
        let content = base_content();
        let mut snapshot = compute_metrics(&base_state(&content));
        snapshot.tick = tick;
        snapshot
    }

    fn test_meta() -> MetaState {
        base_state(&base_content()).meta
    }

    fn test_counters() -> Counters {
        Counters {
            next_event_id: 0,
            next_command_id: 0,
            trains_spawned: 0,
        }
    }

    fn raised(events: &[EventEnvelope], id: &str) -> bool {
        events
            .iter()
            .any(|e| matches!(&e.event, Event::AlertRaised { alert_id, .. } if alert_id == id))
    }

    fn cleared(events: &[EventEnvelope], id: &str) -> bool {
        events
            .iter()
            .any(|e| matches!(&e.event, Event::AlertCleared { alert_id } if alert_id == id))
    }

    #[test]
    fn new_engine_has_no_active_alerts() {
        let engine = AlertEngine::new(2);
        assert!(engine.active_alert_ids().is_empty());
    }

    #[test]
    fn evaluate_with_empty_history_fires_nothing() {
        let history = VecDeque::new();
        let mut counters = test_counters();
        let mut engine = AlertEngine::new(2);
        let events = engine.evaluate(&history, &test_meta(), &mut counters);
        assert!(events.is_empty());
    }

    #[test]
    fn evaluate_raises_and_clears_platform_saturation() {
        let mut history = VecDeque::new();
        let mut counters = test_counters();
        let mut engine = AlertEngine::new(2);
        let meta = test_meta();

        let mut snap = empty_snapshot(1);
        snap.platforms_occupied = snap.platforms_total;
        history.push_back(snap);

        let events = engine.evaluate(&history, &meta, &mut counters);
        assert!(raised(&events, "PLATFORMS_SATURATED"));
        assert_eq!(engine.active_alert_ids(), vec!["PLATFORMS_SATURATED".to_string()]);

        // Same data again: no transition, no events.
        let events = engine.evaluate(&history, &meta, &mut counters);
        assert!(events.is_empty(), "no state change should mean no events");

        let mut snap = empty_snapshot(2);
        snap.platforms_occupied = 3;
        history.push_back(snap);
        let events = engine.evaluate(&history, &meta, &mut counters);
        assert!(cleared(&events, "PLATFORMS_SATURATED"));
        assert!(engine.active_alert_ids().is_empty());
    }

    #[test]
    fn request_queue_alert_needs_two_requesting() {
        let mut history = VecDeque::new();
        let mut counters = test_counters();
        let mut engine = AlertEngine::new(2);
        let meta = test_meta();

        let mut snap = empty_snapshot(1);
        snap.requesting = 1;
        history.push_back(snap);
        assert!(!raised(
            &engine.evaluate(&history, &meta, &mut counters),
            "REQUEST_QUEUE_BUILDING"
        ));

        let mut snap = empty_snapshot(2);
        snap.requesting = 2;
        history.push_back(snap);
        assert!(raised(
            &engine.evaluate(&history, &meta, &mut counters),
            "REQUEST_QUEUE_BUILDING"
        ));
    }

    #[test]
    fn countdown_critical_uses_near_miss_window() {
        let mut history = VecDeque::new();
        let mut counters = test_counters();
        let mut engine = AlertEngine::new(2);
        let meta = test_meta();

        let mut snap = empty_snapshot(1);
        snap.countdown_active = true;
        snap.countdown_seconds_left = 3;
        history.push_back(snap.clone());
        assert!(engine.evaluate(&history, &meta, &mut counters).is_empty());

        snap.tick = 2;
        snap.countdown_seconds_left = 2;
        history.push_back(snap);
        let events = engine.evaluate(&history, &meta, &mut counters);
        assert!(raised(&events, "COUNTDOWN_CRITICAL"));
        match &events[0].event {
            Event::AlertRaised { severity, .. } => assert_eq!(*severity, Severity::Error),
            other => panic!("expected AlertRaised, got {other:?}"),
        }
    }

    #[test]
    fn near_miss_streak_ignores_previous_session() {
        let mut history = VecDeque::new();
        let mut counters = test_counters();
        let mut engine = AlertEngine::new(2);
        let meta = test_meta();

        let mut old = empty_snapshot(1);
        old.near_misses = 5;
        history.push_back(old);
        let mut fresh = empty_snapshot(2);
        fresh.session = 2;
        history.push_back(fresh.clone());
        assert!(!raised(
            &engine.evaluate(&history, &meta, &mut counters),
            "NEAR_MISS_STREAK"
        ));

        fresh.tick = 3;
        fresh.near_misses = 2;
        history.push_back(fresh);
        assert!(raised(
            &engine.evaluate(&history, &meta, &mut counters),
            "NEAR_MISS_STREAK"
        ));
    }

    #[test]
    fn alert_event_ids_continue_the_session_counter() {
        let mut history = VecDeque::new();
        let mut counters = test_counters();
        counters.next_event_id = 41;
        let mut engine = AlertEngine::new(2);

        let mut snap = empty_snapshot(1);
        snap.requesting = 3;
        history.push_back(snap);
        let events = engine.evaluate(&history, &test_meta(), &mut counters);

        assert_eq!(events[0].id.0, "evt_000041");
        assert_eq!(counters.next_event_id, 42);
    }
}
