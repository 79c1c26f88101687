// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! MAX_STREAM_DATA frame (RFC 9000 §19.10) — per-stream flow-control
//! credit advertisement. Legacy deployments refer to the same concept as
//! WINDOW_UPDATE; this type is the one the core's `FlowController` emits.

use crate::varint::VarInt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamData {
    pub stream_id: VarInt,
    pub maximum_stream_data: VarInt,
}
