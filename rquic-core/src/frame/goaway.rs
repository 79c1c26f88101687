// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! GOAWAY — an HTTP/2-over-QUIC-style control frame (spec.md Glossary:
//! "static stream"). Not part of RFC 9000; carried here because the
//! Session's goaway bookkeeping (spec.md §4.5) is in scope even though the
//! HTTP framing layer that transmits it is not.

use crate::varint::VarInt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goaway {
    /// The largest stream id the sender will continue to process.
    pub last_good_stream_id: VarInt,
}
