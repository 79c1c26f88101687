// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! STREAMS_BLOCKED frame (RFC 9000 §19.14).

use crate::{frame::StreamIdCategory, varint::VarInt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamsBlocked {
    pub category: StreamIdCategory,
    /// The stream limit the sender is currently blocked on.
    pub stream_limit: VarInt,
}
