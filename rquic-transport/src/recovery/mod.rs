// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Loss recovery: the retransmission-timer state machine that owns every
//! sent packet (spec.md §4.1).

pub mod loss_detector;
pub mod sent_packet_manager;
pub mod unacked_packet_map;

pub use loss_detector::LossDetector;
pub use sent_packet_manager::{AckOutcome, Mode, SentPacketManager, TimeoutOutcome, UberSentPacketManager};
pub use unacked_packet_map::{Frame, TransmissionInfo, UnackedPacketMap};
