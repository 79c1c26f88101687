// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! MAX_STREAMS frame (RFC 9000 §19.11).

use crate::{frame::StreamIdCategory, varint::VarInt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreams {
    pub category: StreamIdCategory,
    /// The cumulative number of streams of `category` the peer may open.
    pub maximum_streams: VarInt,
}
