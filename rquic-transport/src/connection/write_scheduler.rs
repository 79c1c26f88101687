// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-connection write scheduling: static-stream preemption plus a
//! priority queue with batched writes (spec.md §4.3).

use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;

pub const PRIORITY_LEVELS: usize = 8;

#[derive(Debug, Clone, Copy)]
struct BatchState {
    stream_id: u64,
    remaining: u64,
}

/// A short, ascending-by-id collection of static streams (crypto, HTTP/2-
/// over-QUIC headers): these never yield to data streams or to
/// lower-priority static streams, and always pop first (spec.md §4.3).
#[derive(Debug, Default)]
struct StaticStreamCollection {
    entries: SmallVec<[(u64, bool); 4]>,
    blocked_count: usize,
}

impl StaticStreamCollection {
    fn register(&mut self, id: u64) {
        if self.entries.iter().any(|&(s, _)| s == id) {
            return;
        }
        let idx = self.entries.partition_point(|&(s, _)| s < id);
        self.entries.insert(idx, (id, false));
    }

    fn unregister(&mut self, id: u64) {
        if let Some(idx) = self.entries.iter().position(|&(s, _)| s == id) {
            if self.entries[idx].1 {
                self.blocked_count -= 1;
            }
            self.entries.remove(idx);
        }
    }

    fn mark_blocked(&mut self, id: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|(s, _)| *s == id) {
            if !entry.1 {
                entry.1 = true;
                self.blocked_count += 1;
            }
        }
    }

    fn first_blocked(&self) -> Option<u64> {
        self.entries.iter().find(|(_, blocked)| *blocked).map(|(id, _)| *id)
    }

    fn pop_first_blocked(&mut self) -> Option<u64> {
        let idx = self.entries.iter().position(|(_, blocked)| *blocked)?;
        self.entries[idx].1 = false;
        self.blocked_count -= 1;
        Some(self.entries[idx].0)
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|&(s, _)| s == id)
    }
}

/// The connection-wide write scheduler (spec.md §4.3).
pub struct WriteScheduler {
    static_streams: StaticStreamCollection,
    priorities: [VecDeque<u64>; PRIORITY_LEVELS],
    ready: HashSet<u64>,
    registered_priority: HashMap<u64, u8>,
    batch: [Option<BatchState>; PRIORITY_LEVELS],
    last_priority_popped: Option<u8>,
    batch_quota_bytes: u64,
}

impl WriteScheduler {
    pub fn new(batch_quota_bytes: u64) -> Self {
        Self {
            static_streams: StaticStreamCollection::default(),
            priorities: Default::default(),
            ready: HashSet::new(),
            registered_priority: HashMap::new(),
            batch: Default::default(),
            last_priority_popped: None,
            batch_quota_bytes,
        }
    }

    pub fn register_static(&mut self, id: u64) {
        self.static_streams.register(id);
    }

    pub fn register(&mut self, id: u64, priority: u8) {
        debug_assert!((priority as usize) < PRIORITY_LEVELS);
        self.registered_priority.insert(id, priority.min(PRIORITY_LEVELS as u8 - 1));
    }

    pub fn unregister(&mut self, id: u64) {
        if self.static_streams.contains(id) {
            self.static_streams.unregister(id);
            return;
        }
        if let Some(priority) = self.registered_priority.remove(&id) {
            self.priorities[priority as usize].retain(|&s| s != id);
            self.ready.remove(&id);
            if let Some(batch) = self.batch[priority as usize] {
                if batch.stream_id == id {
                    self.batch[priority as usize] = None;
                }
            }
        }
    }

    pub fn update_precedence(&mut self, id: u64, new_priority: u8) {
        let Some(&old_priority) = self.registered_priority.get(&id) else {
            return;
        };
        if old_priority == new_priority {
            return;
        }
        let was_ready = self.ready.contains(&id);
        self.priorities[old_priority as usize].retain(|&s| s != id);
        self.registered_priority.insert(id, new_priority);
        if was_ready {
            self.priorities[new_priority as usize].push_back(id);
        }
    }

    fn mark_ready(&mut self, id: u64, push_front: bool) {
        let Some(&priority) = self.registered_priority.get(&id) else {
            return;
        };
        if self.ready.contains(&id) {
            return;
        }
        self.ready.insert(id);
        let queue = &mut self.priorities[priority as usize];
        if push_front {
            queue.push_front(id);
        } else {
            queue.push_back(id);
        }
    }

    /// `AddStream` (spec.md §4.3): static streams are marked blocked;
    /// data streams are queued, jumping to the front of their priority if
    /// they are the partially-consumed batch stream at that level.
    pub fn add_stream(&mut self, id: u64) {
        if self.static_streams.contains(id) {
            self.static_streams.mark_blocked(id);
            return;
        }
        let Some(&priority) = self.registered_priority.get(&id) else {
            return;
        };
        let push_front = self.last_priority_popped == Some(priority)
            && self.batch[priority as usize]
                .map(|b| b.stream_id == id && b.remaining > 0)
                .unwrap_or(false);
        self.mark_ready(id, push_front);
    }

    fn peek_next(&self) -> Option<u64> {
        if let Some(id) = self.static_streams.first_blocked() {
            return Some(id);
        }
        self.priorities.iter().find_map(|q| q.front().copied())
    }

    /// `PopFront` (spec.md §4.3).
    pub fn pop_next_ready(&mut self) -> Option<u64> {
        if let Some(id) = self.static_streams.pop_first_blocked() {
            return Some(id);
        }

        for (level, queue) in self.priorities.iter_mut().enumerate() {
            if let Some(id) = queue.pop_front() {
                self.ready.remove(&id);
                if queue.is_empty() {
                    self.batch[level] = None;
                }
                let level = level as u8;
                let is_current_batch_stream = self.batch[level as usize]
                    .map(|b| b.stream_id == id)
                    .unwrap_or(false);
                if !is_current_batch_stream {
                    self.batch[level as usize] = Some(BatchState {
                        stream_id: id,
                        remaining: self.batch_quota_bytes,
                    });
                }
                self.last_priority_popped = Some(level);
                return Some(id);
            }
        }
        None
    }

    /// `UpdateBytesForStream` (spec.md §4.3).
    pub fn update_bytes_for_stream(&mut self, written: u64) {
        if let Some(level) = self.last_priority_popped {
            if let Some(batch) = self.batch[level as usize].as_mut() {
                batch.remaining = batch.remaining.saturating_sub(written);
            }
        }
    }

    pub fn batch_remaining(&self, priority: u8) -> Option<u64> {
        self.batch[priority as usize].map(|b| b.remaining)
    }

    pub fn is_ready(&self, id: u64) -> bool {
        self.static_streams.first_blocked() == Some(id) || self.ready.contains(&id)
    }

    pub fn has_ready_streams(&self) -> bool {
        self.static_streams.blocked_count > 0 || self.priorities.iter().any(|q| !q.is_empty())
    }

    pub fn num_ready_streams(&self) -> usize {
        self.static_streams.blocked_count + self.priorities.iter().map(|q| q.len()).sum::<usize>()
    }

    /// `ShouldYield(id)` (spec.md §4.3).
    pub fn should_yield(&self, id: u64) -> bool {
        if self.static_streams.contains(id) {
            return self.static_streams.first_blocked() != Some(id);
        }
        if self.static_streams.blocked_count > 0 {
            return true;
        }
        self.peek_next() != Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_write_budget_scenario() {
        let mut sched = WriteScheduler::new(16_000);
        sched.register(1, 3);
        sched.register(2, 3);
        sched.add_stream(1);
        sched.add_stream(2);

        assert_eq!(sched.pop_next_ready(), Some(1));
        sched.update_bytes_for_stream(15_999);
        sched.add_stream(1);
        assert_eq!(sched.pop_next_ready(), Some(1));
        sched.update_bytes_for_stream(1);
        sched.add_stream(1);
        assert_eq!(sched.pop_next_ready(), Some(2));
    }

    #[test]
    fn static_preemption_scenario() {
        let mut sched = WriteScheduler::new(16_000);
        sched.register_static(0);
        sched.register(4, 3);
        sched.add_stream(4);
        sched.add_stream(0);
        assert_eq!(sched.pop_next_ready(), Some(0));
        assert_eq!(sched.pop_next_ready(), Some(4));
    }

    #[test]
    fn register_unregister_round_trips() {
        let mut sched = WriteScheduler::new(16_000);
        sched.register(7, 2);
        sched.unregister(7);
        assert!(!sched.has_ready_streams());
        assert_eq!(sched.num_ready_streams(), 0);
    }
}
