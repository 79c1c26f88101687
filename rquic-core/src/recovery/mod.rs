// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! External-interface and primitive types for loss recovery (spec.md §4.1,
//! §6). The stateful orchestration (`SentPacketManager`,
//! `UnackedPacketMap`) lives in `rquic-transport`; this module holds only
//! what the core exposes as a stable collaborator boundary.

pub mod congestion_controller;
pub mod pacer;
pub mod rtt_estimator;

pub use congestion_controller::{AckedPacket, AlwaysSend, LostPacket, SendAlgorithm};
pub use pacer::Pacer;
pub use rtt_estimator::RttStats;
