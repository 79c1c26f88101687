// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-stream state, its send buffer and flow control, and the
//! connection-wide stream-ID admission policy (spec.md §4.2, §4.4).

pub mod flow_control;
pub mod send_buffer;
pub mod stream;
pub mod stream_id_manager;

pub use flow_control::FlowController;
pub use send_buffer::SendBuffer;
pub use stream::{AckListener, CloseReason, Priority, Stream};
pub use stream_id_manager::{Blocked, IncomingStreamIdLimiter, OutgoingStreamIdLimiter};
