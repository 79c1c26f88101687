// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The connection-wide orchestrator: the stream arena, the priority
//! write scheduler, and the `Session` that ties them together with the
//! stream-ID manager (spec.md §4.3, §4.5).

pub mod session;
pub mod stream_map;
pub mod write_scheduler;

pub use session::{ControlSignal, Session};
pub use stream_map::StreamMap;
pub use write_scheduler::WriteScheduler;
