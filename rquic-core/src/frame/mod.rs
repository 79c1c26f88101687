// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Wire frame types the transport core sends and receives (spec.md §6).
//!
//! This is deliberately not a byte-compatible codec for every historical
//! QUIC draft (spec.md §1 Non-goals) — only the frames the four in-scope
//! subsystems produce or consume are modeled, with just enough encode/
//! decode to keep the numeric contracts (varint fields, bit flags) exact.

mod ack;
mod goaway;
mod max_stream_data;
mod max_streams;
mod reset_stream;
mod stop_sending;
mod stream;
mod streams_blocked;

pub use ack::{Ack, AckRange};
pub use goaway::Goaway;
pub use max_stream_data::MaxStreamData;
pub use max_streams::MaxStreams;
pub use reset_stream::ResetStream;
pub use stop_sending::StopSending;
pub use stream::Stream;
pub use streams_blocked::StreamsBlocked;

/// Whether a frame requires the peer to send an ACK in response.
///
/// PADDING and ACK frames are non-eliciting; everything else the core
/// sends is eliciting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckElicitation {
    NonEliciting,
    Eliciting,
}

impl AckElicitation {
    #[inline]
    pub fn is_eliciting(self) -> bool {
        matches!(self, AckElicitation::Eliciting)
    }
}

/// Whether a stream ID category (spec.md §4.4) the frame concerns is
/// bidirectional or unidirectional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamIdCategory {
    Bidirectional,
    Unidirectional,
}
