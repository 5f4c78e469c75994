//! Clock/timer service.
//!
//! Every deferred transition (spawn, request, countdown tick, departure) is a
//! timer in one min-heap keyed by simulated due time. Timers with the same due
//! time fire in scheduling order. Cancelling removes the timer from the pending
//! table, so a cancelled timer can never fire; its heap slot is discarded when
//! it reaches the top.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::TrainId;

/// Handle returned by [`TimerQueue::schedule`]. Ids are never reused, including
/// across restarts, so a handle from an ended session cannot alias a new timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    Spawn,
    Request(TrainId),
    CountdownTick(TrainId),
    Depart(TrainId),
}

#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(u64, TimerId)>>,
    pending: AHashMap<TimerId, (u64, TimerKind)>,
    next_id: u64,
}

impl TimerQueue {
    pub fn schedule(&mut self, due_ms: u64, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse((due_ms, id)));
        self.pending.insert(id, (due_ms, kind));
        id
    }

    /// Returns `false` if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Drops every pending timer. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.heap.clear();
        cancelled
    }

    /// Removes and returns the earliest timer due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerId, TimerKind)> {
        while let Some(&Reverse((due_ms, id))) = self.heap.peek() {
            if due_ms > now_ms {
                return None;
            }
            self.heap.pop();
            if let Some((_, kind)) = self.pending.remove(&id) {
                return Some((id, kind));
            }
        }
        None
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn due_at(&self, id: TimerId) -> Option<u64> {
        self.pending.get(&id).map(|(due_ms, _)| *due_ms)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.values().map(|(due_ms, _)| *due_ms).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending timers sorted by firing order.
    pub fn pending(&self) -> Vec<(u64, TimerId, &TimerKind)> {
        let mut entries: Vec<(u64, TimerId, &TimerKind)> = self
            .pending
            .iter()
            .map(|(id, (due_ms, kind))| (*due_ms, *id, kind))
            .collect();
        entries.sort_by_key(|(due_ms, id, _)| (*due_ms, *id));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train(name: &str) -> TrainId {
        TrainId(name.to_string())
    }

    #[test]
    fn pops_in_due_order_then_schedule_order() {
        let mut timers = TimerQueue::default();
        timers.schedule(2000, TimerKind::Spawn);
        timers.schedule(1000, TimerKind::Request(train("a")));
        timers.schedule(1000, TimerKind::Depart(train("b")));

        assert_eq!(
            timers.pop_due(5000).map(|(_, k)| k),
            Some(TimerKind::Request(train("a")))
        );
        assert_eq!(
            timers.pop_due(5000).map(|(_, k)| k),
            Some(TimerKind::Depart(train("b")))
        );
        assert_eq!(timers.pop_due(5000).map(|(_, k)| k), Some(TimerKind::Spawn));
        assert!(timers.pop_due(5000).is_none());
    }

    #[test]
    fn nothing_fires_before_due() {
        let mut timers = TimerQueue::default();
        timers.schedule(1000, TimerKind::Spawn);
        assert!(timers.pop_due(999).is_none());
        assert!(timers.pop_due(1000).is_some());
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timers = TimerQueue::default();
        let id = timers.schedule(1000, TimerKind::CountdownTick(train("a")));
        timers.schedule(1500, TimerKind::Spawn);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id), "second cancel is a no-op");
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.pop_due(2000).map(|(_, k)| k), Some(TimerKind::Spawn));
    }

    #[test]
    fn cancel_all_empties_queue_and_ids_stay_unique() {
        let mut timers = TimerQueue::default();
        let first = timers.schedule(1000, TimerKind::Spawn);
        timers.schedule(1000, TimerKind::Request(train("a")));
        assert_eq!(timers.cancel_all(), 2);
        assert!(timers.is_empty());
        assert!(timers.pop_due(u64::MAX).is_none());

        let second = timers.schedule(1000, TimerKind::Spawn);
        assert_ne!(first, second);
        assert!(!timers.is_pending(first));
    }

    #[test]
    fn next_due_ignores_cancelled() {
        let mut timers = TimerQueue::default();
        let early = timers.schedule(100, TimerKind::Spawn);
        timers.schedule(900, TimerKind::Spawn);
        timers.cancel(early);
        assert_eq!(timers.next_due(), Some(900));
    }
}
