//! Logical clock and timer queue
//!
//! The engine is single-threaded and cooperative: everything runs in
//! reaction to field-change events, timer firings, and fetch completion
//! events, serialized by the host's event loop. This module makes the
//! time dimension explicit — a logical clock plus a timer queue — so
//! debounce behaves deterministically and tests drive time manually
//! instead of sleeping.
//!
//! Timers fire in deadline order; ties break by arming order. Cancelled
//! timers are dropped lazily when they surface at the head of the heap.

use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Identity of one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, PartialEq, Eq)]
struct TimerEntry {
    deadline_ms: u64,
    id: TimerId,
}

// Earliest deadline first, then earliest-armed first (min-heap via reversal)
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline_ms
            .cmp(&self.deadline_ms)
            .then(other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Manually advanceable clock with a timer queue.
///
/// Hosts advance it from their own notion of time; tests advance it
/// directly. After `advance`, due timers are drained with `pop_due` and
/// handed back to the owning table's timer handler.
#[derive(Debug, Default)]
pub struct Runtime {
    now_ms: u64,
    next_id: u64,
    timers: BinaryHeap<TimerEntry>,
    cancelled: FxHashSet<TimerId>,
}

impl Runtime {
    /// Create a runtime at logical time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Arm a timer `delay_ms` from now
    pub fn set_timer(&mut self, delay_ms: u64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(TimerEntry {
            deadline_ms: self.now_ms.saturating_add(delay_ms),
            id,
        });
        id
    }

    /// Cancel an armed timer; cancelling an already-fired id is a no-op
    pub fn cancel_timer(&mut self, id: TimerId) {
        self.cancelled.insert(id);
    }

    /// Advance logical time by `delta_ms`
    pub fn advance(&mut self, delta_ms: u64) {
        self.now_ms = self.now_ms.saturating_add(delta_ms);
    }

    /// Remove and return the next due timer, if any.
    ///
    /// A timer is due when its deadline is at or before the current
    /// logical time. Cancelled timers are skipped.
    pub fn pop_due(&mut self) -> Option<TimerId> {
        while let Some(entry) = self.timers.peek() {
            if entry.deadline_ms > self.now_ms {
                return None;
            }
            if let Some(due) = self.timers.pop() {
                if !self.cancelled.remove(&due.id) {
                    return Some(due.id);
                }
            }
        }
        None
    }

    /// Whether any timer is armed and not cancelled
    pub fn has_pending_timers(&self) -> bool {
        self.timers.iter().any(|e| !self.cancelled.contains(&e.id))
    }
}
