// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! IETF-style stream-ID accounting: outgoing allocation, incoming
//! admission, and the MAX_STREAMS/STREAMS_BLOCKED control signals
//! (spec.md §4.4).

use hashbrown::HashSet;
use rquic_core::{
    connection_error::TransportErrorCode,
    endpoint,
    stream_id::{StreamId, StreamType},
};

/// Returned by `OutgoingStreamIdLimiter::next_id` when every allocated id
/// has been used; a recoverable signalling state, not a fatal error
/// (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocked {
    /// The value to carry in the resulting STREAMS_BLOCKED frame.
    pub current_max_count: u64,
}

/// Tracks stream ids the local endpoint allocates.
#[derive(Debug)]
pub struct OutgoingStreamIdLimiter {
    initiator: endpoint::Type,
    stream_type: StreamType,
    max_allowed_count: u64,
    next_index: u64,
}

impl OutgoingStreamIdLimiter {
    pub fn new(initiator: endpoint::Type, stream_type: StreamType, initial_max_count: u64) -> Self {
        Self {
            initiator,
            stream_type,
            max_allowed_count: initial_max_count,
            next_index: 0,
        }
    }

    pub fn max_allowed_count(&self) -> u64 {
        self.max_allowed_count
    }

    /// `GetNextOutgoingStreamId()` (spec.md §4.4).
    pub fn next_id(&mut self) -> Result<StreamId, Blocked> {
        if self.next_index >= self.max_allowed_count {
            return Err(Blocked {
                current_max_count: self.max_allowed_count,
            });
        }
        let id = StreamId::nth(self.initiator, self.stream_type, self.next_index)
            .expect("next_index bounded by max_allowed_count, which fits in a varint");
        self.next_index += 1;
        Ok(id)
    }

    /// `MAX_STREAMS(count)` received (spec.md §4.4): ignored unless it
    /// raises the limit.
    pub fn on_max_streams_received(&mut self, count: u64) {
        if count > self.max_allowed_count {
            self.max_allowed_count = count;
        }
    }

    /// Registering a static stream consumes one id slot without eating
    /// into the application-visible budget (spec.md §4.4).
    pub fn reserve_one(&mut self) {
        self.max_allowed_count += 1;
    }
}

/// The largest number of not-yet-opened peer stream ids this endpoint
/// will track before closing the connection with
/// `TOO_MANY_AVAILABLE_STREAMS` (SPEC_FULL.md §12).
const MAX_AVAILABLE_STREAMS: usize = 1000;

/// Tracks admission of peer-initiated stream ids of one category.
#[derive(Debug)]
pub struct IncomingStreamIdLimiter {
    initiator: endpoint::Type,
    stream_type: StreamType,
    max_allowed_count: u64,
    advertised_max_count: u64,
    window: u64,
    largest_peer_created_index: Option<u64>,
    available: HashSet<u64>,
    closed_count: u64,
}

impl IncomingStreamIdLimiter {
    pub fn new(initiator: endpoint::Type, stream_type: StreamType, initial_max_count: u64) -> Self {
        Self {
            initiator,
            stream_type,
            max_allowed_count: initial_max_count,
            advertised_max_count: initial_max_count,
            window: (initial_max_count / 2).max(1),
            largest_peer_created_index: None,
            available: HashSet::new(),
            closed_count: 0,
        }
    }

    pub fn max_allowed_count(&self) -> u64 {
        self.max_allowed_count
    }

    pub fn advertised_max_count(&self) -> u64 {
        self.advertised_max_count
    }

    /// Admits a peer-initiated `id`, marking every lower id of the same
    /// category as available if `id` is a new high-water mark (spec.md
    /// §4.4, "Available-stream set"). Returns an error if `id` exceeds
    /// `max_allowed_count`, or if doing so would track too many available
    /// ids at once.
    pub fn admit(&mut self, id: StreamId) -> Result<(), TransportErrorCode> {
        debug_assert_eq!(id.initiator(), self.initiator);
        debug_assert_eq!(id.stream_type(), self.stream_type);

        let index = id.category_index();
        if index >= self.max_allowed_count {
            return Err(TransportErrorCode::InvalidStreamId);
        }

        match self.largest_peer_created_index {
            Some(largest) if index <= largest => {
                self.available.remove(&index);
            }
            largest => {
                let start = largest.map(|l| l + 1).unwrap_or(0);
                let newly_available = index.saturating_sub(start);
                if self.available.len() as u64 + newly_available > MAX_AVAILABLE_STREAMS as u64 {
                    return Err(TransportErrorCode::TooManyAvailableStreams);
                }
                for pending in start..index {
                    self.available.insert(pending);
                }
                self.largest_peer_created_index = Some(index);
            }
        }
        Ok(())
    }

    pub fn is_available(&self, id: StreamId) -> bool {
        self.available.contains(&id.category_index())
    }

    /// Credit advertisement on closing an incoming stream (spec.md §4.4):
    /// when the remaining unused budget drops to the window, extend the
    /// limit and return the new value to advertise via MAX_STREAMS.
    pub fn on_stream_closed(&mut self) -> Option<u64> {
        self.closed_count += 1;
        let remaining = self.max_allowed_count.saturating_sub(self.closed_count);
        if remaining <= self.window {
            self.max_allowed_count += 1;
            self.advertised_max_count = self.max_allowed_count;
            Some(self.max_allowed_count)
        } else {
            None
        }
    }

    /// Registering a static stream consumes one id slot without eating
    /// into the application-visible budget (spec.md §4.4).
    pub fn reserve_one(&mut self) {
        self.max_allowed_count += 1;
    }

    /// `STREAMS_BLOCKED(count)` received (spec.md §4.4).
    pub fn on_streams_blocked_received(&mut self, count: u64) -> Result<Option<u64>, TransportErrorCode> {
        use core::cmp::Ordering;
        match count.cmp(&self.advertised_max_count) {
            Ordering::Equal => Ok(None),
            Ordering::Less => {
                if self.max_allowed_count > self.advertised_max_count {
                    self.advertised_max_count = self.max_allowed_count;
                    Ok(Some(self.max_allowed_count))
                } else {
                    Ok(None)
                }
            }
            Ordering::Greater => Err(TransportErrorCode::StreamIdBlockedError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outgoing_allocation_is_blocked_at_limit() {
        let mut limiter = OutgoingStreamIdLimiter::new(endpoint::Type::Client, StreamType::Bidirectional, 2);
        assert!(limiter.next_id().is_ok());
        assert!(limiter.next_id().is_ok());
        let err = limiter.next_id().unwrap_err();
        assert_eq!(err.current_max_count, 2);
        limiter.on_max_streams_received(3);
        assert!(limiter.next_id().is_ok());
    }

    #[test]
    fn max_streams_received_never_lowers_the_limit() {
        let mut limiter = OutgoingStreamIdLimiter::new(endpoint::Type::Client, StreamType::Bidirectional, 5);
        limiter.on_max_streams_received(2);
        assert_eq!(limiter.max_allowed_count(), 5);
    }

    #[test]
    fn admitting_a_higher_id_marks_gap_available() {
        let mut limiter = IncomingStreamIdLimiter::new(endpoint::Type::Server, StreamType::Bidirectional, 100);
        let id4 = StreamId::nth(endpoint::Type::Server, StreamType::Bidirectional, 4).unwrap();
        limiter.admit(id4).unwrap();
        let id2 = StreamId::nth(endpoint::Type::Server, StreamType::Bidirectional, 2).unwrap();
        assert!(limiter.is_available(id2));
        assert!(limiter.admit(id2).is_ok());
        assert!(!limiter.is_available(id2));
    }

    #[test]
    fn id_above_max_is_fatal() {
        let mut limiter = IncomingStreamIdLimiter::new(endpoint::Type::Server, StreamType::Bidirectional, 1);
        let id_over = StreamId::nth(endpoint::Type::Server, StreamType::Bidirectional, 1).unwrap();
        assert_eq!(limiter.admit(id_over), Err(TransportErrorCode::InvalidStreamId));
    }

    #[test]
    fn credit_advances_on_third_close_of_five() {
        let mut limiter = IncomingStreamIdLimiter::new(endpoint::Type::Client, StreamType::Bidirectional, 5);
        assert_eq!(limiter.window, 2);
        assert_eq!(limiter.on_stream_closed(), None);
        assert_eq!(limiter.on_stream_closed(), None);
        assert_eq!(limiter.on_stream_closed(), Some(6));
    }
}
