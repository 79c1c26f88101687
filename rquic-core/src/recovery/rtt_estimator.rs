// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Smoothed round-trip-time tracking, consumed by
//! `SentPacketManager::get_retransmission_time` (spec.md §4.1) to compute
//! RTO/TLP delays.

use crate::time::Timestamp;
use core::{
    cmp::{max, min},
    time::Duration,
};

/// Used when no RTT sample is yet available.
pub const DEFAULT_INITIAL_RTT: Duration = Duration::from_millis(333);
/// The lowest RTT value the estimator tracks.
pub const MIN_RTT: Duration = Duration::from_micros(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RttStats {
    latest_rtt: Duration,
    min_rtt: Duration,
    smoothed_rtt: Duration,
    /// The mean deviation in observed RTT samples (spec.md calls this
    /// `mean_deviation`; RFC 9002 calls the same quantity `rttvar`).
    mean_deviation: Duration,
    max_ack_delay: Duration,
    first_rtt_sample: Option<Timestamp>,
}

impl Default for RttStats {
    fn default() -> Self {
        RttStats::new(DEFAULT_INITIAL_RTT)
    }
}

impl RttStats {
    pub fn new(initial_rtt: Duration) -> Self {
        let initial_rtt = initial_rtt.max(MIN_RTT);
        Self {
            latest_rtt: initial_rtt,
            min_rtt: initial_rtt,
            smoothed_rtt: initial_rtt,
            mean_deviation: initial_rtt / 2,
            max_ack_delay: Duration::ZERO,
            first_rtt_sample: None,
        }
    }

    #[inline]
    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    #[inline]
    pub fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt
    }

    #[inline]
    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    #[inline]
    pub fn mean_deviation(&self) -> Duration {
        self.mean_deviation
    }

    #[inline]
    pub fn has_measurement(&self) -> bool {
        self.first_rtt_sample.is_some()
    }

    #[inline]
    pub fn on_max_ack_delay(&mut self, max_ack_delay: Duration) {
        self.max_ack_delay = max_ack_delay;
    }

    #[inline]
    pub fn max_ack_delay(&self) -> Duration {
        self.max_ack_delay
    }

    /// Updates the estimate from a new sample. `ack_delay` should already
    /// have been decoded using the peer's ack-delay-exponent transport
    /// parameter (spec.md §6).
    pub fn update_rtt(&mut self, ack_delay: Duration, rtt_sample: Duration, now: Timestamp) {
        self.latest_rtt = rtt_sample.max(MIN_RTT);

        if self.first_rtt_sample.is_none() {
            self.first_rtt_sample = Some(now);
            self.min_rtt = self.latest_rtt;
            self.smoothed_rtt = self.latest_rtt;
            self.mean_deviation = self.latest_rtt / 2;
            return;
        }

        self.min_rtt = min(self.min_rtt, self.latest_rtt);

        let ack_delay = min(ack_delay, self.max_ack_delay);
        let adjusted_rtt = if self.min_rtt + ack_delay < self.latest_rtt {
            self.latest_rtt - ack_delay
        } else {
            self.latest_rtt
        };

        let deviation_sample = abs_difference(self.smoothed_rtt, adjusted_rtt);
        self.mean_deviation = weighted_average(self.mean_deviation, deviation_sample, 4);
        self.smoothed_rtt = weighted_average(self.smoothed_rtt, adjusted_rtt, 8);
    }

    /// Widens the RTT variance estimate after detecting that a run of RTO
    /// retransmissions was spurious (spec.md §4.1, §8 scenario 3): the
    /// large gap between `smoothed_rtt` and the true RTT the spurious RTO
    /// implies is folded back into `mean_deviation` so future RTO
    /// computations are less aggressive.
    pub fn expire_smoothed_metrics(&mut self) {
        self.mean_deviation = max(
            self.mean_deviation,
            abs_difference(self.smoothed_rtt, self.latest_rtt),
        );
        self.smoothed_rtt = max(self.smoothed_rtt, self.latest_rtt);
    }
}

fn abs_difference(a: Duration, b: Duration) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

fn weighted_average(prior: Duration, sample: Duration, weight: u32) -> Duration {
    ((prior * (weight - 1)) + sample) / weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_smoothed_rtt() {
        let mut rtt = RttStats::new(Duration::from_millis(100));
        let now = Timestamp::from_duration(Duration::from_secs(1));
        rtt.update_rtt(Duration::ZERO, Duration::from_millis(50), now);
        assert_eq!(rtt.smoothed_rtt(), Duration::from_millis(50));
        assert_eq!(rtt.min_rtt(), Duration::from_millis(50));
    }

    #[test]
    fn expire_smoothed_metrics_widens_variance() {
        let mut rtt = RttStats::new(Duration::from_millis(100));
        let now = Timestamp::from_duration(Duration::from_secs(1));
        rtt.update_rtt(Duration::ZERO, Duration::from_millis(50), now);
        rtt.update_rtt(Duration::ZERO, Duration::from_millis(200), now);
        let before = rtt.mean_deviation();
        rtt.expire_smoothed_metrics();
        assert!(rtt.mean_deviation() >= before);
        assert!(rtt.smoothed_rtt() >= Duration::from_millis(200));
    }
}
