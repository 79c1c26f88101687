// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The arena owning every stream of a connection by id (Design Notes §9:
//! "model as a central arena owning streams by id; all cross-references
//! are stream ids resolved through the session's map").

use hashbrown::HashMap;

use rquic_core::stream_id::StreamId;

use crate::stream::Stream;

/// Owns every live stream, plus the zombies still absorbing ack callbacks
/// after both half-closes (spec.md Glossary: "Zombie stream").
#[derive(Default)]
pub struct StreamMap {
    open: HashMap<u64, Stream>,
    zombies: HashMap<u64, Stream>,
}

impl StreamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stream: Stream) {
        self.open.insert(u64::from(stream.id()), stream);
    }

    pub fn get(&self, id: StreamId) -> Option<&Stream> {
        let key = u64::from(id);
        self.open.get(&key).or_else(|| self.zombies.get(&key))
    }

    pub fn get_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        let key = u64::from(id);
        match self.open.get_mut(&key) {
            Some(stream) => Some(stream),
            None => self.zombies.get_mut(&key),
        }
    }

    pub fn contains(&self, id: StreamId) -> bool {
        let key = u64::from(id);
        self.open.contains_key(&key) || self.zombies.contains_key(&key)
    }

    pub fn remove(&mut self, id: StreamId) -> Option<Stream> {
        let key = u64::from(id);
        self.open.remove(&key).or_else(|| self.zombies.remove(&key))
    }

    /// Moves any open stream that newly classifies as a zombie into the
    /// zombie map, then drops zombies that have finished waiting for acks
    /// (spec.md §9: "the cleanup alarm moves them to a closed list and
    /// finally drops them"). Returns the ids that became zombies.
    pub fn reap(&mut self) -> Vec<u64> {
        let newly_zombied: Vec<u64> = self
            .open
            .iter()
            .filter(|(_, stream)| stream.is_zombie())
            .map(|(id, _)| *id)
            .collect();
        for id in &newly_zombied {
            if let Some(stream) = self.open.remove(id) {
                self.zombies.insert(*id, stream);
            }
        }

        let drained: Vec<u64> = self
            .zombies
            .iter()
            .filter(|(_, stream)| !stream.is_waiting_for_acks())
            .map(|(id, _)| *id)
            .collect();
        for id in drained {
            self.zombies.remove(&id);
        }

        newly_zombied
    }

    /// Drops `id` immediately if it is fully closed and was never a
    /// zombie (no retransmission pipeline to drain).
    pub fn remove_if_closed(&mut self, id: StreamId) -> bool {
        let key = u64::from(id);
        let should_remove = self.open.get(&key).is_some_and(|s| s.is_closed());
        if should_remove {
            self.open.remove(&key);
        }
        should_remove
    }

    pub fn len(&self) -> usize {
        self.open.len() + self.zombies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn zombie_count(&self) -> usize {
        self.zombies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquic_core::{endpoint, stream_id::StreamType};

    fn make_stream(n: u64) -> Stream {
        let id = StreamId::nth(endpoint::Type::Client, StreamType::Bidirectional, n).unwrap();
        Stream::new(id, rquic_core::stream_id::Direction::Bidirectional, 3, 1 << 16, 1 << 16, 1 << 16)
    }

    #[test]
    fn zombie_streams_are_reaped_once_acked() {
        let mut map = StreamMap::new();
        let mut s = make_stream(0);
        let id = s.id();
        s.write_or_buffer_data(b"x", true, 1 << 20).unwrap();
        s.reset(rquic_core::connection_error::StreamErrorCode::StreamCancelled);
        // local reset clears is_waiting_for_acks, so it never becomes a zombie
        map.insert(s);
        assert_eq!(map.reap(), Vec::<u64>::new());
        assert!(map.get(id).is_some());
    }

    #[test]
    fn remove_if_closed_only_removes_fully_closed_streams() {
        let mut map = StreamMap::new();
        let mut s = make_stream(0);
        let id = s.id();
        s.write_or_buffer_data(b"x", false, 1 << 20).unwrap();
        map.insert(s);
        assert!(!map.remove_if_closed(id));
        assert_eq!(map.len(), 1);
    }
}
