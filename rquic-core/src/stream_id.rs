// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Types and utilities around the QUIC stream identifier.

use crate::{endpoint, varint::VarInt};

/// Whether a stream carries data in both directions or just one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

/// The direction data may flow on a stream, from the local endpoint's point
/// of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Bidirectional,
    /// Locally readable only; the peer can write, we cannot.
    ReadOnly,
    /// Locally writable only; we can write, the peer cannot.
    WriteOnly,
}

/// The ID of a stream.
///
/// A stream ID is a 62-bit integer that is unique for all streams on a
/// connection. The two least significant bits encode
/// `(client-initiated?, unidirectional?)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(VarInt);

impl From<StreamId> for VarInt {
    #[inline]
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl From<StreamId> for u64 {
    #[inline]
    fn from(id: StreamId) -> Self {
        id.0.as_u64()
    }
}

impl StreamId {
    #[inline]
    pub const fn from_varint(id: VarInt) -> StreamId {
        StreamId(id)
    }

    #[inline]
    pub const fn as_varint(self) -> VarInt {
        self.0
    }

    /// The initial (0th) stream ID for a given initiator/type combination.
    #[inline]
    pub fn initial(initiator: endpoint::Type, stream_type: StreamType) -> StreamId {
        match (
            stream_type == StreamType::Bidirectional,
            initiator == endpoint::Type::Client,
        ) {
            (true, true) => StreamId(VarInt::from_u32(0)),
            (true, false) => StreamId(VarInt::from_u32(1)),
            (false, true) => StreamId(VarInt::from_u32(2)),
            (false, false) => StreamId(VarInt::from_u32(3)),
        }
    }

    /// The n-th stream ID for a type of stream; IDs of a type are spaced 4
    /// apart. Returns `None` if the resulting ID would overflow.
    #[inline]
    pub fn nth(initiator: endpoint::Type, stream_type: StreamType, n: u64) -> Option<StreamId> {
        let initial = Self::initial(initiator, stream_type);
        let id = VarInt::new(n.checked_mul(4)?.checked_add(initial.0.into())?).ok()?;
        Some(StreamId(id))
    }

    /// The next stream ID of the same type (same initiator/directionality).
    #[inline]
    pub fn next_of_type(self) -> Option<StreamId> {
        self.0
            .checked_add(VarInt::from_u32(4))
            .map(StreamId::from_varint)
    }

    #[inline]
    pub fn initiator(self) -> endpoint::Type {
        if self.0.as_u64() & 0x01 == 0 {
            endpoint::Type::Client
        } else {
            endpoint::Type::Server
        }
    }

    #[inline]
    pub fn stream_type(self) -> StreamType {
        if self.0.as_u64() & 0x02 == 0 {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        }
    }

    /// The direction data flows on this stream from `local`'s point of
    /// view.
    pub fn direction(self, local: endpoint::Type) -> Direction {
        match self.stream_type() {
            StreamType::Bidirectional => Direction::Bidirectional,
            StreamType::Unidirectional => {
                if self.initiator() == local {
                    Direction::WriteOnly
                } else {
                    Direction::ReadOnly
                }
            }
        }
    }

    /// Ordinal index of this ID within its (initiator, type) category,
    /// i.e. the inverse of [`Self::nth`].
    pub fn category_index(self) -> u64 {
        let initial: u64 = Self::initial(self.initiator(), self.stream_type()).0.into();
        (self.0.as_u64() - initial) / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::MAX_VARINT_VALUE;

    #[test]
    fn initial_stream_ids() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [endpoint::Type::Client, endpoint::Type::Server] {
                let id = StreamId::initial(initiator, stream_type);
                assert_eq!(stream_type, id.stream_type());
                assert_eq!(initiator, id.initiator());
            }
        }
    }

    #[test]
    fn stream_id_overflow() {
        let max_stream_id = VarInt::new((1 << 62) - 1).unwrap();
        let max_increasable = StreamId::from_varint(max_stream_id - VarInt::from_u32(4));
        assert!(max_increasable.next_of_type().is_some());

        for increment in 1..5u32 {
            let id = StreamId::from_varint(max_stream_id - VarInt::from_u32(4) + VarInt::from_u32(increment));
            assert!(id.next_of_type().is_none());
        }
    }

    #[test]
    fn nth_round_trips_category_index() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [endpoint::Type::Client, endpoint::Type::Server] {
                for n in 0..10u64 {
                    let id = StreamId::nth(initiator, stream_type, n).unwrap();
                    assert_eq!(id.category_index(), n);
                }
            }
        }
    }

    #[test]
    fn invalid_nth_stream_id() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [endpoint::Type::Client, endpoint::Type::Server] {
                assert_eq!(
                    None,
                    StreamId::nth(initiator, stream_type, (MAX_VARINT_VALUE / 2) + 1)
                );
            }
        }
    }

    #[test]
    fn direction_classification() {
        let id = StreamId::initial(endpoint::Type::Client, StreamType::Unidirectional);
        assert_eq!(id.direction(endpoint::Type::Client), Direction::WriteOnly);
        assert_eq!(id.direction(endpoint::Type::Server), Direction::ReadOnly);

        let bidi = StreamId::initial(endpoint::Type::Client, StreamType::Bidirectional);
        assert_eq!(bidi.direction(endpoint::Type::Client), Direction::Bidirectional);
    }
}
