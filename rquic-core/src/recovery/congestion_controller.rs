// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The pluggable congestion-control boundary (spec.md §1, §6).
//!
//! Concrete algorithms (Cubic, BBR, ...) are out of scope; the
//! sent-packet manager only ever talks to this trait.

use crate::time::Timestamp;
use core::time::Duration;

/// A single acknowledged or lost packet, as reported to
/// [`SendAlgorithm::on_congestion_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckedPacket {
    pub packet_number: u64,
    pub sent_bytes: u32,
    pub time_sent: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LostPacket {
    pub packet_number: u64,
    pub sent_bytes: u32,
    pub time_sent: Timestamp,
}

/// The interface a concrete congestion-control algorithm implements
/// (spec.md §6). The sent-packet manager and pacer are the only core
/// components that call into this trait.
pub trait SendAlgorithm {
    fn on_packet_sent(
        &mut self,
        sent_time: Timestamp,
        bytes_in_flight: u32,
        packet_number: u64,
        sent_bytes: u32,
        has_retransmittable_data: bool,
    );

    fn on_congestion_event(
        &mut self,
        rtt_updated: bool,
        prior_in_flight: u32,
        event_time: Timestamp,
        acked_packets: &[AckedPacket],
        lost_packets: &[LostPacket],
    );

    fn can_send(&self, bytes_in_flight: u32) -> bool;

    fn pacing_rate(&self, bytes_in_flight: u32) -> Option<u64>;

    fn bandwidth_estimate(&self) -> Option<u64>;

    fn congestion_window_bytes(&self) -> u32;

    fn in_slow_start(&self) -> bool;

    fn in_recovery(&self) -> bool;

    fn on_retransmission_timeout(&mut self, packets_retransmitted: bool);

    fn on_connection_migration(&mut self);

    fn on_application_limited(&mut self, bytes_in_flight: u32);

    fn adjust_network_parameters(
        &mut self,
        bandwidth: Option<u64>,
        rtt: Option<Duration>,
        allow_cwnd_decrease: bool,
    );

    fn set_initial_cwnd_packets(&mut self, packets: u32);

    fn set_num_emulated_connections(&mut self, n: usize);
}

/// A minimal, deterministic [`SendAlgorithm`] used for tests and as a
/// reference implementation of the trait contract: always allows sending,
/// never paces, and reports a fixed congestion window.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysSend {
    congestion_window_bytes: u32,
}

impl Default for AlwaysSend {
    fn default() -> Self {
        Self {
            congestion_window_bytes: 12_000,
        }
    }
}

impl SendAlgorithm for AlwaysSend {
    fn on_packet_sent(
        &mut self,
        _sent_time: Timestamp,
        _bytes_in_flight: u32,
        _packet_number: u64,
        _sent_bytes: u32,
        _has_retransmittable_data: bool,
    ) {
    }

    fn on_congestion_event(
        &mut self,
        _rtt_updated: bool,
        _prior_in_flight: u32,
        _event_time: Timestamp,
        _acked_packets: &[AckedPacket],
        _lost_packets: &[LostPacket],
    ) {
    }

    fn can_send(&self, bytes_in_flight: u32) -> bool {
        bytes_in_flight < self.congestion_window_bytes
    }

    fn pacing_rate(&self, _bytes_in_flight: u32) -> Option<u64> {
        None
    }

    fn bandwidth_estimate(&self) -> Option<u64> {
        None
    }

    fn congestion_window_bytes(&self) -> u32 {
        self.congestion_window_bytes
    }

    fn in_slow_start(&self) -> bool {
        true
    }

    fn in_recovery(&self) -> bool {
        false
    }

    fn on_retransmission_timeout(&mut self, _packets_retransmitted: bool) {}

    fn on_connection_migration(&mut self) {}

    fn on_application_limited(&mut self, _bytes_in_flight: u32) {}

    fn adjust_network_parameters(
        &mut self,
        _bandwidth: Option<u64>,
        _rtt: Option<Duration>,
        _allow_cwnd_decrease: bool,
    ) {
    }

    fn set_initial_cwnd_packets(&mut self, packets: u32) {
        self.congestion_window_bytes = packets * 1200;
    }

    fn set_num_emulated_connections(&mut self, _n: usize) {}
}
