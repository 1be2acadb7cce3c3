// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A cancellable timer queue.
//!
//! The loading subsystem is reactive: it never blocks, it schedules. Every
//! deadline (maximum time, minimum floor, stall watchdog, retry backoff,
//! per-resource timeouts) is an entry in a [`TimerQueue`], and the owner fires
//! due entries from its `tick`/`poll` method. Because every entry is owned by
//! the queue, clearing the queue is enough to guarantee that no timer from a
//! previous session fires into the next one.

use std::time::Duration;

/// Identifies a scheduled timer; breaks ties between equal deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct TimerEntry<K> {
    id: TimerId,
    deadline: Duration,
    payload: K,
}

/// A deadline-ordered set of pending timers carrying a payload of type `K`.
///
/// Timers with equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<K> {
    next_id: u64,
    // Sorted by (deadline, id).
    entries: Vec<TimerEntry<K>>,
}

impl<K> TimerQueue<K> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Schedules `payload` to fire at `deadline`.
    pub fn schedule(&mut self, deadline: Duration, payload: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let index = self
            .entries
            .partition_point(|entry| (entry.deadline, entry.id) <= (deadline, id));
        self.entries.insert(
            index,
            TimerEntry {
                id,
                deadline,
                payload,
            },
        );
        id
    }

    /// Cancels every timer whose payload matches `predicate`, returning how
    /// many were removed.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !predicate(&entry.payload));
        before - self.entries.len()
    }

    /// Removes and returns the earliest timer whose deadline is at or before
    /// `now`, together with its deadline.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerId, Duration, K)> {
        if self.entries.first()?.deadline > now {
            return None;
        }
        let entry = self.entries.remove(0);
        Some((entry.id, entry.deadline, entry.payload))
    }

    /// Returns the earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.first().map(|entry| entry.deadline)
    }

    /// Returns `true` if any pending payload matches `predicate`.
    pub fn any(&self, mut predicate: impl FnMut(&K) -> bool) -> bool {
        self.entries.iter().any(|entry| predicate(&entry.payload))
    }

    /// Cancels every timer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(300), "late");
        queue.schedule(ms(100), "early");
        queue.schedule(ms(200), "middle");

        let fired: Vec<_> = std::iter::from_fn(|| queue.pop_due(ms(1000)))
            .map(|(_, _, payload)| payload)
            .collect();
        assert_eq!(fired, vec!["early", "middle", "late"]);
    }

    #[test]
    fn equal_deadlines_fire_in_schedule_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(100), 1);
        queue.schedule(ms(100), 2);
        queue.schedule(ms(100), 3);

        let fired: Vec<_> = std::iter::from_fn(|| queue.pop_due(ms(100)))
            .map(|(_, _, payload)| payload)
            .collect();
        assert_eq!(fired, vec![1, 2, 3]);
    }

    #[test]
    fn nothing_fires_before_deadline() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(100), ());
        assert!(queue.pop_due(ms(99)).is_none());
        assert!(queue.pop_due(ms(100)).is_some());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(10), "stale");
        assert_eq!(queue.cancel_where(|p| *p == "stale"), 1);
        assert_eq!(queue.cancel_where(|p| *p == "stale"), 0);
        assert!(queue.pop_due(ms(100)).is_none());
    }

    #[test]
    fn cancel_where_filters_by_payload() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(10), 1);
        queue.schedule(ms(20), 2);
        queue.schedule(ms(30), 1);
        assert_eq!(queue.cancel_where(|p| *p == 1), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_deadline(), Some(ms(20)));
    }

    #[test]
    fn pop_due_reports_scheduled_deadline() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(50), ());
        let (_, deadline, _) = queue.pop_due(ms(500)).unwrap();
        assert_eq!(deadline, ms(50));
    }
}
