// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The retransmission-timer state machine for a single packet-number
//! space (spec.md §4.1).
//!
//! `SentPacketManager` owns every `TransmissionInfo` sent in its space and
//! hands the rest of the connection exactly three kinds of outcome: a
//! packet was lost (here are its frames), a packet was acked (here are its
//! frames), or the retransmission timer should fire at time T and do X.
//! `UberSentPacketManager` below fans this out across the three spaces
//! (SPEC_FULL.md §12).

use core::time::Duration;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::vec::Vec;

use rquic_core::{
    recovery::{AckedPacket, LostPacket, RttStats, SendAlgorithm},
    time::Timestamp,
    transmission,
};

use crate::config::{CoreConfig, TlpVariant};

use super::{
    loss_detector::LossDetector,
    unacked_packet_map::{Frame, TransmissionInfo, UnackedPacketMap},
};

/// Exponential backoff on RTO/handshake/TLP delays is clamped at 2^10,
/// matching the legacy source's `kMaxRetransmissions` shift clamp
/// (SPEC_FULL.md §12).
const MAX_BACKOFF_SHIFT: u32 = 10;

/// Which retransmission-timer mode is currently active, in the strict
/// precedence order of spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Handshake,
    Loss,
    Tlp,
    Rto,
}

/// What happened when a retransmission timeout fired.
#[derive(Debug)]
pub enum TimeoutOutcome {
    /// Every in-flight crypto packet was re-marked for handshake
    /// retransmission; its frames are returned for direct resend.
    Handshake { frames: Vec<Frame> },
    /// The loss detector found packets below the time/packet-count
    /// threshold; their frames are reported (not necessarily retransmitted
    /// verbatim — the caller may retransmit selectively).
    Loss { frames: Vec<Frame> },
    /// A tail loss probe was scheduled; the caller should prefer sending
    /// new data and only fall back to retransmission if none is pending.
    TailLossProbe,
    /// The RTO fired: up to `max_rto_packets` oldest retransmittable
    /// packets were marked for direct resend; any non-retransmittable
    /// in-flight packets were abandoned without a loss report.
    Rto { frames: Vec<Frame> },
    /// Nothing outstanding; the timer should not have been armed.
    Nothing,
}

/// The outcome of a completed `on_ack_frame_start..on_ack_frame_end`
/// sequence.
#[derive(Debug, Default)]
pub struct AckOutcome {
    pub acked_new_packet: bool,
    pub rtt_updated: bool,
    pub acked_frames: Vec<Frame>,
    pub spurious_retransmission_detected: bool,
}

struct AckFrameState {
    largest_acked: u64,
    ack_delay: Duration,
    /// Collected in the descending order `on_ack_range` delivers ranges,
    /// reversed to ascending in `on_ack_frame_end` (spec.md §4.1).
    newly_acked_descending: Vec<u64>,
}

pub struct SentPacketManager {
    unacked: UnackedPacketMap,
    loss_detector: LossDetector,
    rtt: RttStats,
    pacer: rquic_core::recovery::Pacer,

    initial_rto: Duration,
    max_rto: Duration,
    min_handshake_timeout: Duration,
    min_tlp_delay: Duration,
    max_tail_loss_probes: u32,
    max_rto_packets: usize,
    tlp_variant: TlpVariant,

    /// Original packet number -> packet number of its most recent
    /// retransmission. Replaces the legacy forward pointer carried on
    /// `TransmissionInfo` itself (spec.md §3) with a side table resolved
    /// by packet number, consistent with Design Notes §9's
    /// arena-by-id approach.
    pending_retransmissions: HashMap<u64, u64>,

    largest_acked: Option<u64>,
    largest_acked_sent_time: Option<Timestamp>,
    largest_mtu_acked: u32,

    consecutive_rto_count: u32,
    consecutive_tlp_count: u32,
    consecutive_crypto_count: u32,
    first_rto_transmission: Option<u64>,
    pending_timer_transmission_count: u32,

    last_sent_time: Option<Timestamp>,
    last_crypto_sent_time: Option<Timestamp>,
    loss_time: Option<Timestamp>,
    handshake_confirmed: bool,

    next_packet_number: u64,
    ack_in_progress: Option<AckFrameState>,
}

impl SentPacketManager {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            unacked: UnackedPacketMap::new(),
            loss_detector: LossDetector::new(),
            rtt: RttStats::default(),
            pacer: rquic_core::recovery::Pacer::new(),
            initial_rto: config.initial_rto,
            max_rto: config.max_rto,
            min_handshake_timeout: config.min_handshake_timeout,
            min_tlp_delay: config.min_tlp_delay,
            max_tail_loss_probes: config.max_tail_loss_probes,
            max_rto_packets: config.max_rto_packets,
            tlp_variant: config.tlp_variant,
            pending_retransmissions: HashMap::new(),
            largest_acked: None,
            largest_acked_sent_time: None,
            largest_mtu_acked: 0,
            consecutive_rto_count: 0,
            consecutive_tlp_count: 0,
            consecutive_crypto_count: 0,
            first_rto_transmission: None,
            pending_timer_transmission_count: 0,
            last_sent_time: None,
            last_crypto_sent_time: None,
            loss_time: None,
            handshake_confirmed: false,
            next_packet_number: 0,
            ack_in_progress: None,
        }
    }

    pub fn rtt_stats(&self) -> &RttStats {
        &self.rtt
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.unacked.bytes_in_flight()
    }

    pub fn least_unacked(&self) -> u64 {
        self.unacked.least_unacked()
    }

    pub fn next_packet_number(&mut self) -> u64 {
        let pn = self.next_packet_number;
        self.next_packet_number += 1;
        pn
    }

    pub fn on_handshake_confirmed(&mut self) {
        self.handshake_confirmed = true;
    }

    fn has_unacked_crypto_packets(&self) -> bool {
        self.unacked
            .iter_outstanding()
            .any(|info| info.has_crypto_handshake)
    }

    fn has_unacked_retransmittable_packets(&self) -> bool {
        self.unacked
            .iter_outstanding()
            .any(|info| info.is_ack_eliciting())
    }

    /// `on_packet_sent(packet, original_packet_number, sent_time, type,
    /// has_retransmittable_data) → in_flight_bool` (spec.md §4.1).
    #[allow(clippy::too_many_arguments)]
    pub fn on_packet_sent(
        &mut self,
        packet_number: u64,
        original_packet_number: Option<u64>,
        sent_time: Timestamp,
        transmission_type: transmission::Type,
        frames: SmallVec<[Frame; 4]>,
        has_crypto_handshake: bool,
        bytes_sent: u32,
        send_algorithm: &mut dyn SendAlgorithm,
    ) -> bool {
        if let Some(original) = original_packet_number {
            self.pending_retransmissions.remove(&original);
            self.pending_retransmissions.insert(original, packet_number);
        }

        if self.pending_timer_transmission_count > 0 {
            self.pending_timer_transmission_count -= 1;
        }

        let has_retransmittable_data = !frames.is_empty();
        let bytes_in_flight_before = self.unacked.bytes_in_flight() as u32;

        send_algorithm.on_packet_sent(
            sent_time,
            bytes_in_flight_before,
            packet_number,
            bytes_sent,
            has_retransmittable_data,
        );
        self.pacer.on_packet_sent(
            sent_time,
            bytes_sent as usize,
            self.rtt.smoothed_rtt(),
            send_algorithm.congestion_window_bytes(),
            send_algorithm.in_slow_start(),
        );

        // PROBING/AllInitial/AllUnacked never count against the window;
        // everything else does (glossary: "in-flight").
        let in_flight = !matches!(
            transmission_type,
            transmission::Type::Probing
        );

        #[cfg(feature = "tracing")]
        tracing::trace!(packet_number, bytes_sent, in_flight, ?transmission_type, "packet_sent");

        self.unacked.insert(TransmissionInfo {
            packet_number,
            sent_time,
            bytes_sent,
            retransmittable_frames: frames,
            in_flight,
            has_crypto_handshake,
            transmission_type,
            state: transmission::State::Outstanding,
            original_packet_number,
        });

        self.last_sent_time = Some(sent_time);
        if has_crypto_handshake {
            self.last_crypto_sent_time = Some(sent_time);
        }

        in_flight
    }

    pub fn on_ack_frame_start(&mut self, largest_acked: u64, ack_delay: Duration) {
        self.ack_in_progress = Some(AckFrameState {
            largest_acked,
            ack_delay,
            newly_acked_descending: Vec::new(),
        });
    }

    /// `on_ack_range(start, end_exclusive)`, called zero or more times in
    /// descending order after `on_ack_frame_start` (spec.md §4.1).
    pub fn on_ack_range(&mut self, start: u64, end_exclusive: u64) {
        let Some(state) = self.ack_in_progress.as_mut() else {
            return;
        };
        for pn in (start..end_exclusive).rev() {
            if pn < self.unacked.least_unacked() {
                // below least-unacked: already resolved, drop silently.
                continue;
            }
            match self.unacked.get(pn) {
                Some(info) if info.state == transmission::State::Unackable => {
                    // silently ignored
                }
                Some(info) if info.state == transmission::State::Acked => {
                    // already acked: a bug upstream, but tolerated here.
                }
                Some(_) => state.newly_acked_descending.push(pn),
                None => {}
            }
        }
    }

    /// `on_ack_timestamp(pn, time)` — informational only in this core;
    /// retained for wire fidelity with QUIC's optional ACK timestamp
    /// extension but does not otherwise affect recovery state.
    pub fn on_ack_timestamp(&mut self, _packet_number: u64, _time: Timestamp) {}

    /// `on_ack_frame_end(receive_time) → acked_new_packet_bool`.
    pub fn on_ack_frame_end(
        &mut self,
        receive_time: Timestamp,
        send_algorithm: &mut dyn SendAlgorithm,
    ) -> AckOutcome {
        let Some(mut state) = self.ack_in_progress.take() else {
            return AckOutcome::default();
        };
        // reverse descending collection order into ascending packet-number
        // order before per-packet handling (spec.md §4.1).
        state.newly_acked_descending.reverse();
        let newly_acked = state.newly_acked_descending;

        let mut outcome = AckOutcome::default();
        let prior_in_flight = self.unacked.bytes_in_flight() as u32;
        let mut acked_for_cc = Vec::with_capacity(newly_acked.len());

        // RTT updates only from a fresh sample of the largest acked packet
        // in this frame (RFC 9002 §5.1, referenced by spec.md §4.1).
        let rtt_updated = newly_acked.last() == Some(&state.largest_acked)
            && self
                .unacked
                .get(state.largest_acked)
                .map(|info| {
                    let rtt_sample = receive_time.saturating_duration_since(info.sent_time);
                    self.rtt.update_rtt(state.ack_delay, rtt_sample, receive_time);
                    true
                })
                .unwrap_or(false);
        outcome.rtt_updated = rtt_updated;

        for pn in newly_acked {
            if let Some(info) = self.unacked.get(pn).cloned() {
                acked_for_cc.push(AckedPacket {
                    packet_number: pn,
                    sent_bytes: info.bytes_sent,
                    time_sent: info.sent_time,
                });
                self.mark_packet_handled(pn, state.ack_delay, &mut outcome);
            }
        }

        if state.largest_acked > self.largest_acked.unwrap_or(0) || self.largest_acked.is_none() {
            self.largest_acked = Some(state.largest_acked);
            self.largest_acked_sent_time = self.unacked.get(state.largest_acked).map(|i| i.sent_time);
        }

        if rtt_updated {
            if self.consecutive_rto_count > 0 {
                if let Some(first_rto) = self.first_rto_transmission {
                    if state.largest_acked < first_rto {
                        // the RTO was spurious: the original data made it
                        // through after all (spec.md §4.1, §8 scenario 3).
                        self.rtt.expire_smoothed_metrics();
                        outcome.spurious_retransmission_detected = true;
                    }
                }
            }
            self.consecutive_rto_count = 0;
            self.consecutive_tlp_count = 0;
            self.consecutive_crypto_count = 0;
            self.first_rto_transmission = None;
        }

        self.unacked.compact_front();
        self.recompute_loss_time(receive_time);

        if !acked_for_cc.is_empty() {
            send_algorithm.on_congestion_event(rtt_updated, prior_in_flight, receive_time, &acked_for_cc, &[]);
        }

        outcome
    }

    /// `mark_packet_handled(packet_number, info, ack_delay)` (spec.md
    /// §4.1): resolves one newly-acked packet number.
    fn mark_packet_handled(&mut self, packet_number: u64, _ack_delay: Duration, outcome: &mut AckOutcome) {
        let Some(info) = self.unacked.get(packet_number).cloned() else {
            return;
        };
        if matches!(
            info.state,
            transmission::State::Acked | transmission::State::Unackable
        ) {
            return;
        }

        if let Some(replacement_pn) = self.pending_retransmissions.remove(&packet_number) {
            // the original just got acked after we had already scheduled
            // (or sent) a retransmission for it: spurious.
            outcome.spurious_retransmission_detected = true;
            self.loss_detector.on_spurious_retransmission_detected();
            if let Some(replacement) = self.unacked.get_mut(replacement_pn) {
                if replacement.state == transmission::State::Outstanding {
                    replacement.state = transmission::State::Neutered;
                }
            }
            self.unacked.remove_in_flight(replacement_pn);
        }

        outcome.acked_frames.extend(info.retransmittable_frames.iter().copied());
        self.largest_mtu_acked = self.largest_mtu_acked.max(info.bytes_sent);

        self.unacked.remove_in_flight(packet_number);
        if let Some(info_mut) = self.unacked.get_mut(packet_number) {
            info_mut.state = transmission::State::Acked;
        }
        outcome.acked_new_packet = true;

        #[cfg(feature = "tracing")]
        tracing::trace!(packet_number, "packet_acked");
    }

    fn recompute_loss_time(&mut self, now: Timestamp) {
        self.loss_time = match (self.largest_acked, self.largest_acked_sent_time) {
            (Some(largest_acked), Some(sent_time)) => {
                let result = self.loss_detector.detect_losses(
                    &self.unacked,
                    largest_acked,
                    sent_time,
                    self.rtt.latest_rtt(),
                    self.rtt.smoothed_rtt(),
                    now,
                );
                result.loss_time
            }
            _ => None,
        };
    }

    /// `on_retransmission_timeout()` (spec.md §4.1): dispatches on the
    /// current mode in strict precedence HANDSHAKE > LOSS > TLP > RTO.
    pub fn on_retransmission_timeout(
        &mut self,
        now: Timestamp,
        send_algorithm: &mut dyn SendAlgorithm,
    ) -> TimeoutOutcome {
        if self.unacked.is_empty() {
            return TimeoutOutcome::Nothing;
        }

        let mode = self.current_mode();
        #[cfg(feature = "tracing")]
        tracing::debug!(?mode, "retransmission_timer_fired");

        match mode {
            Mode::Handshake => {
                let frames = self.retransmit_crypto_packets();
                self.consecutive_crypto_count = (self.consecutive_crypto_count + 1).min(MAX_BACKOFF_SHIFT);
                TimeoutOutcome::Handshake { frames }
            }
            Mode::Loss => {
                let (largest_acked, sent_time) =
                    (self.largest_acked.unwrap(), self.largest_acked_sent_time.unwrap());
                let result = self.loss_detector.detect_losses(
                    &self.unacked,
                    largest_acked,
                    sent_time,
                    self.rtt.latest_rtt(),
                    self.rtt.smoothed_rtt(),
                    now,
                );
                let mut lost_packets = Vec::with_capacity(result.lost_packet_numbers.len());
                let mut frames = Vec::new();
                let prior_in_flight = self.unacked.bytes_in_flight() as u32;
                for pn in &result.lost_packet_numbers {
                    if let Some(info) = self.unacked.get_mut(*pn) {
                        if info.state != transmission::State::Outstanding {
                            continue;
                        }
                        info.state = transmission::State::Lost;
                        lost_packets.push(LostPacket {
                            packet_number: *pn,
                            sent_bytes: info.bytes_sent,
                            time_sent: info.sent_time,
                        });
                        frames.extend(info.retransmittable_frames.iter().copied());
                    }
                }
                for pn in &result.lost_packet_numbers {
                    self.unacked.remove_in_flight(*pn);
                }
                #[cfg(feature = "tracing")]
                for pn in &lost_packets {
                    tracing::trace!(packet_number = pn.packet_number, "packet_lost");
                }
                self.unacked.compact_front();
                self.loss_time = result.loss_time;
                if !lost_packets.is_empty() {
                    send_algorithm.on_congestion_event(false, prior_in_flight, now, &[], &lost_packets);
                }
                TimeoutOutcome::Loss { frames }
            }
            Mode::Tlp => {
                self.pending_timer_transmission_count = 1;
                self.consecutive_tlp_count += 1;
                TimeoutOutcome::TailLossProbe
            }
            Mode::Rto => {
                let frames = self.retransmit_rto_packets(now, send_algorithm);
                self.consecutive_rto_count = (self.consecutive_rto_count + 1).min(MAX_BACKOFF_SHIFT);
                send_algorithm.on_retransmission_timeout(!frames.is_empty());
                TimeoutOutcome::Rto { frames }
            }
        }
    }

    fn current_mode(&self) -> Mode {
        if !self.handshake_confirmed && self.has_unacked_crypto_packets() {
            Mode::Handshake
        } else if self.loss_time.is_some() {
            Mode::Loss
        } else if self.consecutive_tlp_count < self.max_tail_loss_probes
            && self.has_unacked_retransmittable_packets()
        {
            Mode::Tlp
        } else {
            Mode::Rto
        }
    }

    fn retransmit_crypto_packets(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let pending: Vec<u64> = self
            .unacked
            .iter_outstanding()
            .filter(|info| info.has_crypto_handshake)
            .map(|info| info.packet_number)
            .collect();
        for pn in pending {
            if let Some(info) = self.unacked.get_mut(pn) {
                frames.extend(info.retransmittable_frames.iter().copied());
                info.transmission_type = transmission::Type::Handshake;
                if !transmission::Type::Handshake.leaves_bytes_in_flight() {
                    info.in_flight = false;
                }
            }
            self.unacked.remove_in_flight(pn);
        }
        frames
    }

    /// Selects up to `max_rto_packets` oldest retransmittable in-flight
    /// packets and resends each under a fresh packet number, linked back
    /// to the original via `on_packet_sent`'s `original_packet_number`;
    /// abandons any non-retransmittable in-flight packets without a loss
    /// report (spec.md §4.1). The original stays `Outstanding` — if it is
    /// later acked, `mark_packet_handled` finds the replacement through
    /// `pending_retransmissions` and neuters it as spurious.
    fn retransmit_rto_packets(&mut self, now: Timestamp, send_algorithm: &mut dyn SendAlgorithm) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut selected = 0usize;

        let candidates: Vec<(u64, bool)> = self
            .unacked
            .iter_outstanding()
            .map(|info| (info.packet_number, info.is_ack_eliciting()))
            .collect();

        for (pn, retransmittable) in candidates {
            if retransmittable {
                if selected >= self.max_rto_packets {
                    continue;
                }
                let Some(info) = self.unacked.get(pn).cloned() else {
                    continue;
                };
                frames.extend(info.retransmittable_frames.iter().copied());
                let new_pn = self.next_packet_number();
                self.on_packet_sent(
                    new_pn,
                    Some(pn),
                    now,
                    transmission::Type::Rto,
                    info.retransmittable_frames,
                    info.has_crypto_handshake,
                    info.bytes_sent,
                    send_algorithm,
                );
                selected += 1;
                if self.first_rto_transmission.is_none() {
                    self.first_rto_transmission = Some(new_pn);
                }
            } else {
                // abandon non-retransmittable in-flight packets silently.
                self.unacked.remove_in_flight(pn);
            }
        }

        frames
    }

    /// `time_until_send(now)` (spec.md §4.1).
    pub fn time_until_send(&self, now: Timestamp, send_algorithm: &dyn SendAlgorithm) -> Duration {
        if self.pending_timer_transmission_count > 0 {
            return Duration::ZERO;
        }
        let bytes_in_flight = self.unacked.bytes_in_flight() as u32;
        if send_algorithm.pacing_rate(bytes_in_flight).is_some() {
            return self.pacer.time_until_send(now);
        }
        if send_algorithm.can_send(bytes_in_flight) {
            Duration::ZERO
        } else {
            Duration::MAX
        }
    }

    /// `get_retransmission_time()` (spec.md §4.1).
    pub fn get_retransmission_time(&self) -> Option<Timestamp> {
        if self.unacked.is_empty() && !self.has_unacked_crypto_packets() {
            return None;
        }
        match self.current_mode() {
            Mode::Handshake => {
                let last = self.last_crypto_sent_time?;
                Some(last.saturating_add(self.handshake_retransmission_delay()))
            }
            Mode::Loss => self.loss_time,
            Mode::Tlp => {
                let last = self.last_sent_time?;
                Some(last.saturating_add(self.tlp_delay()))
            }
            Mode::Rto => {
                let last = self.last_sent_time?;
                let rto = last.saturating_add(self.rto_delay());
                let tlp = last.saturating_add(self.tlp_delay());
                Some(rto.max(tlp))
            }
        }
    }

    fn base_rto_delay(&self) -> Duration {
        if !self.rtt.has_measurement() {
            return self.initial_rto;
        }
        let computed = self.rtt.smoothed_rtt() + self.rtt.mean_deviation() * 4;
        // floored at the same minimum used before any RTT sample exists.
        computed.max(self.initial_rto)
    }

    fn rto_delay(&self) -> Duration {
        let shift = self.consecutive_rto_count.min(MAX_BACKOFF_SHIFT);
        let backed_off = self
            .base_rto_delay()
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_rto);
        backed_off.min(self.max_rto)
    }

    fn handshake_retransmission_delay(&self) -> Duration {
        let shift = self.consecutive_crypto_count.min(MAX_BACKOFF_SHIFT);
        let base = self.base_rto_delay().max(self.min_handshake_timeout);
        base.checked_mul(1u32 << shift).unwrap_or(self.max_rto).min(self.max_rto)
    }

    /// TLP delay formula, selected by `TlpVariant` (spec.md §4.1).
    fn tlp_delay(&self) -> Duration {
        let srtt = self.rtt.smoothed_rtt();
        let max_ack_delay = self.rtt.max_ack_delay();

        if self.unacked.iter_outstanding().count() <= 1 {
            let two_srtt = srtt * 2;
            let one_half_srtt_plus_half_rto = srtt * 3 / 2 + self.base_rto_delay() / 2;
            return max_duration(two_srtt, one_half_srtt_plus_half_rto);
        }

        let computed = match self.tlp_variant {
            TlpVariant::HalfRtt => srtt / 2,
            TlpVariant::Ietf1_5 => srtt * 3 / 2 + max_ack_delay,
            TlpVariant::Ietf2_0 => srtt * 2 + max_ack_delay,
        };
        max_duration(self.min_tlp_delay, computed)
    }
}

fn max_duration(a: Duration, b: Duration) -> Duration {
    if a > b {
        a
    } else {
        b
    }
}

/// Fans a single-space `SentPacketManager` out across the three
/// packet-number spaces (SPEC_FULL.md §12, supplementing the spec's
/// single-instance description with the per-space indirection the
/// original source actually uses).
pub struct UberSentPacketManager {
    initial: SentPacketManager,
    handshake: SentPacketManager,
    application: SentPacketManager,
}

impl UberSentPacketManager {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            initial: SentPacketManager::new(config),
            handshake: SentPacketManager::new(config),
            application: SentPacketManager::new(config),
        }
    }

    pub fn space(&self, space: rquic_core::packet_number::PacketNumberSpace) -> &SentPacketManager {
        match space {
            rquic_core::packet_number::PacketNumberSpace::Initial => &self.initial,
            rquic_core::packet_number::PacketNumberSpace::Handshake => &self.handshake,
            rquic_core::packet_number::PacketNumberSpace::ApplicationData => &self.application,
        }
    }

    pub fn space_mut(
        &mut self,
        space: rquic_core::packet_number::PacketNumberSpace,
    ) -> &mut SentPacketManager {
        match space {
            rquic_core::packet_number::PacketNumberSpace::Initial => &mut self.initial,
            rquic_core::packet_number::PacketNumberSpace::Handshake => &mut self.handshake,
            rquic_core::packet_number::PacketNumberSpace::ApplicationData => &mut self.application,
        }
    }

    /// The RTT estimate used connection-wide is the application-data
    /// space's, falling back to handshake while Application keys aren't
    /// available yet: both paths share one network route.
    pub fn rtt_stats(&self) -> &RttStats {
        if self.application.rtt.has_measurement() {
            self.application.rtt_stats()
        } else {
            self.handshake.rtt_stats()
        }
    }

    pub fn total_bytes_in_flight(&self) -> u64 {
        self.initial.bytes_in_flight() + self.handshake.bytes_in_flight() + self.application.bytes_in_flight()
    }

    /// Discards in-flight packets of `space`, neutering rather than
    /// dropping them so cross-references (`pending_retransmissions`)
    /// remain consistent (spec.md §4.1, "Neutering").
    pub fn neuter(&mut self, space: rquic_core::packet_number::PacketNumberSpace) {
        let manager = self.space_mut(space);
        let pending: Vec<u64> = manager
            .unacked
            .iter_outstanding()
            .map(|info| info.packet_number)
            .collect();
        for pn in pending {
            manager.pending_retransmissions.remove(&pn);
            if let Some(info) = manager.unacked.get_mut(pn) {
                info.state = transmission::State::Neutered;
            }
            manager.unacked.remove_in_flight(pn);
        }
        manager.unacked.compact_front();
    }

    /// Next alarm deadline across all spaces (the earliest wins).
    pub fn get_retransmission_time(&self) -> Option<Timestamp> {
        [
            self.initial.get_retransmission_time(),
            self.handshake.get_retransmission_time(),
            self.application.get_retransmission_time(),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquic_core::recovery::AlwaysSend;

    fn manager() -> SentPacketManager {
        SentPacketManager::new(&CoreConfig::default())
    }

    fn stream_frame(pn: u64) -> SmallVec<[Frame; 4]> {
        let mut v = SmallVec::new();
        v.push(Frame::Stream {
            stream_id: 0,
            offset: pn * 100,
            length: 100,
            is_fin: false,
        });
        v
    }

    #[test]
    fn on_packet_sent_tracks_bytes_in_flight() {
        let mut mgr = manager();
        let mut cc = AlwaysSend::default();
        let now = Timestamp::from_duration(Duration::from_secs(1));
        mgr.on_packet_sent(
            0,
            None,
            now,
            transmission::Type::NotRetransmission,
            stream_frame(0),
            false,
            100,
            &mut cc,
        );
        assert_eq!(mgr.bytes_in_flight(), 100);
    }

    #[test]
    fn ack_of_only_packet_clears_in_flight() {
        let mut mgr = manager();
        let mut cc = AlwaysSend::default();
        let t0 = Timestamp::from_duration(Duration::from_secs(1));
        mgr.on_packet_sent(
            0,
            None,
            t0,
            transmission::Type::NotRetransmission,
            stream_frame(0),
            false,
            100,
            &mut cc,
        );
        let t1 = Timestamp::from_duration(Duration::from_millis(1050));
        mgr.on_ack_frame_start(0, Duration::ZERO);
        mgr.on_ack_range(0, 1);
        let outcome = mgr.on_ack_frame_end(t1, &mut cc);
        assert!(outcome.acked_new_packet);
        assert_eq!(outcome.acked_frames.len(), 1);
        assert_eq!(mgr.bytes_in_flight(), 0);
    }

    #[test]
    fn spurious_rto_detection_expires_smoothed_metrics() {
        let mut mgr = manager();
        let mut cc = AlwaysSend::default();
        let t0 = Timestamp::from_duration(Duration::from_secs(1));
        for pn in 0..5u64 {
            mgr.on_packet_sent(
                pn,
                None,
                t0,
                transmission::Type::NotRetransmission,
                stream_frame(pn),
                false,
                100,
                &mut cc,
            );
        }
        // force RTO precedence: no acks yet, TLP budget exhausted.
        mgr.consecutive_tlp_count = mgr.max_tail_loss_probes;
        let timeout_time = Timestamp::from_duration(Duration::from_secs(10));
        let outcome = mgr.on_retransmission_timeout(timeout_time, &mut cc);
        assert!(matches!(outcome, TimeoutOutcome::Rto { .. }));
        // retransmissions go out under fresh packet numbers (5, 6), not
        // the original 0/1 — first_rto_transmission tracks the new one.
        assert_eq!(mgr.first_rto_transmission, Some(5));

        // packet 0 (below first_rto_transmission) is now acked: spurious.
        mgr.on_ack_frame_start(0, Duration::ZERO);
        mgr.on_ack_range(0, 1);
        let ack_outcome = mgr.on_ack_frame_end(timeout_time, &mut cc);
        assert!(ack_outcome.spurious_retransmission_detected);
        assert_eq!(mgr.consecutive_rto_count, 0);
    }
}
