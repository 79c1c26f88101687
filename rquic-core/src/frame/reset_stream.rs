// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! RESET_STREAM frame (RFC 9000 §19.4).

use crate::varint::VarInt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetStream {
    pub stream_id: VarInt,
    pub application_error_code: VarInt,
    /// The final size of the stream, i.e. total bytes sent including any
    /// gaps never filled.
    pub final_size: VarInt,
}
