// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Time- and packet-number-threshold loss detection, consulted by
//! `SentPacketManager` on every ack and retransmission-timeout tick
//! (spec.md §4.1).

use core::time::Duration;
use rquic_core::time::Timestamp;
use std::vec::Vec;

use super::unacked_packet_map::{TransmissionInfo, UnackedPacketMap};

const INITIAL_PACKET_THRESHOLD: u64 = 3;
const MAX_PACKET_THRESHOLD: u64 = 20;
const TIME_THRESHOLD_NUMERATOR: u32 = 9;
const TIME_THRESHOLD_DENOMINATOR: u32 = 8;
const TIMER_GRANULARITY: Duration = Duration::from_millis(1);

/// Packets a detection pass judged lost, plus the time the next
/// time-threshold loss would fire if nothing else happens first.
pub struct LossDetectionResult {
    pub lost_packet_numbers: Vec<u64>,
    pub loss_time: Option<Timestamp>,
}

/// Tracks the reordering threshold, widened after a spurious
/// retransmission is detected so a single reordering event doesn't
/// repeatedly trigger false loss declarations (spec.md §4.1, §8 scenario
/// 3).
#[derive(Debug, Clone, Copy)]
pub struct LossDetector {
    packet_threshold: u64,
}

impl Default for LossDetector {
    fn default() -> Self {
        Self {
            packet_threshold: INITIAL_PACKET_THRESHOLD,
        }
    }
}

impl LossDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when an acked packet turns out to have been a spurious
    /// retransmission target: widens the packet-number reordering
    /// threshold so the same degree of reordering doesn't trigger another
    /// false positive.
    pub fn on_spurious_retransmission_detected(&mut self) {
        self.packet_threshold = (self.packet_threshold + 1).min(MAX_PACKET_THRESHOLD);
    }

    /// Detects which outstanding packets below `largest_acked` are lost,
    /// by either packet-number or time threshold (RFC 9002 §6.1, applied
    /// to the legacy mode machine described in spec.md §4.1).
    pub fn detect_losses(
        &self,
        unacked: &UnackedPacketMap,
        largest_acked: u64,
        largest_acked_sent_time: Timestamp,
        latest_rtt: Duration,
        smoothed_rtt: Duration,
        now: Timestamp,
    ) -> LossDetectionResult {
        let time_threshold = max_duration(latest_rtt, smoothed_rtt)
            * TIME_THRESHOLD_NUMERATOR
            / TIME_THRESHOLD_DENOMINATOR;
        let time_threshold = max_duration(time_threshold, TIMER_GRANULARITY);
        let loss_delay_deadline = largest_acked_sent_time.saturating_add(time_threshold);

        let mut lost_packet_numbers = Vec::new();
        let mut loss_time = None;

        for info in unacked.iter_outstanding() {
            if info.packet_number >= largest_acked {
                break;
            }
            if self.is_lost_by_packet_count(info, largest_acked) {
                lost_packet_numbers.push(info.packet_number);
                continue;
            }
            let sent_plus_threshold = info.sent_time.saturating_add(time_threshold);
            if sent_plus_threshold <= now && info.sent_time <= loss_delay_deadline {
                lost_packet_numbers.push(info.packet_number);
            } else {
                loss_time = Some(match loss_time {
                    Some(t) => core::cmp::min(t, sent_plus_threshold),
                    None => sent_plus_threshold,
                });
            }
        }

        LossDetectionResult {
            lost_packet_numbers,
            loss_time,
        }
    }

    fn is_lost_by_packet_count(&self, info: &TransmissionInfo, largest_acked: u64) -> bool {
        largest_acked.saturating_sub(info.packet_number) >= self.packet_threshold
    }
}

fn max_duration(a: Duration, b: Duration) -> Duration {
    if a > b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquic_core::transmission;
    use smallvec::SmallVec;

    fn push(unacked: &mut UnackedPacketMap, pn: u64, sent_secs: u64) {
        unacked.insert(TransmissionInfo {
            packet_number: pn,
            sent_time: Timestamp::from_duration(Duration::from_secs(sent_secs)),
            bytes_sent: 100,
            retransmittable_frames: SmallVec::new(),
            in_flight: true,
            has_crypto_handshake: false,
            transmission_type: transmission::Type::NotRetransmission,
            state: transmission::State::Outstanding,
            original_packet_number: None,
        });
    }

    #[test]
    fn detects_loss_by_packet_count() {
        let mut unacked = UnackedPacketMap::new();
        for pn in 0..5 {
            push(&mut unacked, pn, pn);
        }
        let detector = LossDetector::new();
        let result = detector.detect_losses(
            &unacked,
            4,
            Timestamp::from_duration(Duration::from_secs(4)),
            Duration::from_millis(100),
            Duration::from_millis(100),
            Timestamp::from_duration(Duration::from_secs(4)),
        );
        // packet 0 is 4 behind the largest acked (4), over the threshold of 3
        assert_eq!(result.lost_packet_numbers, vec![0]);
    }

    #[test]
    fn widened_threshold_survives_spurious_event() {
        let mut detector = LossDetector::new();
        detector.on_spurious_retransmission_detected();
        assert_eq!(detector.packet_threshold, INITIAL_PACKET_THRESHOLD + 1);
    }
}
