// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! STREAM frame (RFC 9000 §19.8).

use crate::varint::VarInt;

const STREAM_TAG: u8 = 0x08;
const OFF_BIT: u8 = 0x04;
const LEN_BIT: u8 = 0x02;
const FIN_BIT: u8 = 0x01;

/// A STREAM frame carrying `data` for `stream_id` at `offset`.
///
/// `Data` is generic so the caller can pass a borrowed slice when encoding
/// and an owned buffer when decoding, matching how the send/receive paths
/// differ in ownership needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream<Data> {
    pub stream_id: VarInt,
    pub offset: VarInt,
    pub is_fin: bool,
    pub data: Data,
}

impl<Data: AsRef<[u8]>> Stream<Data> {
    /// Encodes the frame tag byte for the given flag combination. The LEN
    /// bit is always set by this core (frames are never the last thing in
    /// a packet in a way that would let us omit the length, since packets
    /// here are always explicitly sized).
    pub fn tag(&self) -> u8 {
        let mut tag = STREAM_TAG | LEN_BIT;
        if self.offset.as_u64() != 0 {
            tag |= OFF_BIT;
        }
        if self.is_fin {
            tag |= FIN_BIT;
        }
        tag
    }

    /// Total encoded size of the frame, including the tag byte.
    pub fn encoding_size(&self) -> usize {
        let mut size = 1 + VarInt::try_from(self.stream_id.as_u64()).unwrap().encoding_size();
        if self.offset.as_u64() != 0 {
            size += self.offset.encoding_size();
        }
        let data = self.data.as_ref();
        size + VarInt::try_from(data.len()).expect("frame data too large").encoding_size() + data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_reflects_offset_and_fin() {
        let frame = Stream {
            stream_id: VarInt::from_u32(4),
            offset: VarInt::ZERO,
            is_fin: false,
            data: &b"hello"[..],
        };
        assert_eq!(frame.tag() & OFF_BIT, 0);

        let frame = Stream {
            stream_id: VarInt::from_u32(4),
            offset: VarInt::from_u32(10),
            is_fin: true,
            data: &b""[..],
        };
        assert_eq!(frame.tag() & OFF_BIT, OFF_BIT);
        assert_eq!(frame.tag() & FIN_BIT, FIN_BIT);
    }
}
