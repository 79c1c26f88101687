// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Error codes surfaced at the connection and stream level (spec.md §6, §7).

use crate::endpoint;

/// A QUIC transport-level error code, as would be carried in a
/// CONNECTION_CLOSE or RESET_STREAM frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, displaydoc::Display)]
#[non_exhaustive]
pub enum TransportErrorCode {
    /// flow control limit exceeded
    FlowControlReceivedTooMuchData,
    /// stream exceeded its configured maximum length
    StreamLengthOverflow,
    /// referenced an invalid stream id
    InvalidStreamId,
    /// received STREAMS_BLOCKED advertising more than we told the peer
    StreamIdBlockedError,
    /// wrote to a stream after its FIN had already been sent
    StreamWriteAfterFinSent,
    /// too many not-yet-opened peer stream ids are being tracked
    TooManyAvailableStreams,
    /// peer exceeded the advertised concurrent open stream limit
    TooManyOpenStreams,
    /// the handshake could not complete within the retry budget
    HandshakeFailed,
    /// GOAWAY sent before the handshake completed, or violated monotonicity
    GoawayProtocolViolation,
}

/// A stream-local error, surfaced to the application or used to build a
/// RESET_STREAM/STOP_SENDING frame. These never tear down the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, displaydoc::Display)]
#[non_exhaustive]
pub enum StreamErrorCode {
    /// the stream's TTL deadline elapsed before it could be sent
    StreamTtlExpired,
    /// the application cancelled the stream
    StreamCancelled,
    /// headers exceeded the configured size limit
    HeadersTooLarge,
    /// an ACK arrived for a byte range that was never sent
    RstAcknowledgement,
    /// an application-supplied error code, opaque to the core
    Application(u64),
}

/// Errors a connection can encounter (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display)]
#[non_exhaustive]
pub enum Error {
    /// the connection was closed without an error
    Closed { initiator: endpoint::Location },
    /// the connection was closed at the transport level: {error}
    Transport {
        error: TransportErrorCode,
        initiator: endpoint::Location,
    },
    /// the connection was closed at the application level
    Application {
        error: u64,
        initiator: endpoint::Location,
    },
    /// the connection's idle timer expired
    IdleTimerExpired,
    /// all stream IDs for this connection have been exhausted
    StreamIdExhausted,
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
#[cfg(feature = "std")]
impl std::error::Error for TransportErrorCode {}
#[cfg(feature = "std")]
impl std::error::Error for StreamErrorCode {}
