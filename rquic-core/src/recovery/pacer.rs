// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A packet pacer that spreads bursts of packets over time rather than
//! releasing the full congestion window at once (spec.md §4.1: "the
//! pacer's release time").
//!
//! The pacer is state shared between `SentPacketManager` and the send
//! algorithm; only `SentPacketManager` mutates it (spec.md §5).

use crate::time::Timestamp;
use core::time::Duration;

/// `N` controls how many congestion windows per RTT the pacer spreads
/// packets across; RFC 9002 §7.7 recommends a small value above 1 so RTT
/// variation doesn't underutilize the window. Slow start uses a larger
/// value since the window is growing every round trip.
const N_NUMERATOR: u64 = 5;
const N_DENOMINATOR: u64 = 4;
const SLOW_START_N_NUMERATOR: u64 = 2;
const SLOW_START_N_DENOMINATOR: u64 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct Pacer {
    next_packet_departure_time: Option<Timestamp>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after a packet is sent to push the next departure time out,
    /// proportionally to how much of the pacing interval this packet used.
    pub fn on_packet_sent(
        &mut self,
        now: Timestamp,
        bytes_sent: usize,
        smoothed_rtt: Duration,
        congestion_window_bytes: u32,
        in_slow_start: bool,
    ) {
        if congestion_window_bytes == 0 {
            self.next_packet_departure_time = None;
            return;
        }

        let (num, den) = if in_slow_start {
            (SLOW_START_N_NUMERATOR, SLOW_START_N_DENOMINATOR)
        } else {
            (N_NUMERATOR, N_DENOMINATOR)
        };

        // time to send `bytes_sent` at congestion_window_bytes per
        // (smoothed_rtt * num / den).
        let pacing_window = Duration::from_nanos(
            (smoothed_rtt.as_nanos() as u64).saturating_mul(num) / den.max(1),
        );
        let interval = pacing_window
            .checked_mul(bytes_sent as u32)
            .map(|d| d / congestion_window_bytes.max(1))
            .unwrap_or(Duration::ZERO);

        let base = self.next_packet_departure_time.unwrap_or(now).max(now);
        self.next_packet_departure_time = Some(base.saturating_add(interval));
    }

    /// The instant at which the next packet may depart; `None` if pacing
    /// imposes no delay right now.
    pub fn time_until_send(&self, now: Timestamp) -> Duration {
        match self.next_packet_departure_time {
            Some(t) if t > now => t - now,
            _ => Duration::ZERO,
        }
    }

    pub fn release_time(&self) -> Option<Timestamp> {
        self.next_packet_departure_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paces_proportionally_to_bytes_sent() {
        let mut pacer = Pacer::new();
        let now = Timestamp::from_duration(Duration::from_secs(1));
        pacer.on_packet_sent(now, 1_200, Duration::from_millis(100), 12_000, false);
        assert!(pacer.time_until_send(now) > Duration::ZERO);
    }

    #[test]
    fn no_delay_with_zero_window() {
        let mut pacer = Pacer::new();
        let now = Timestamp::from_duration(Duration::from_secs(1));
        pacer.on_packet_sent(now, 1_200, Duration::from_millis(100), 0, false);
        assert_eq!(pacer.time_until_send(now), Duration::ZERO);
    }
}
