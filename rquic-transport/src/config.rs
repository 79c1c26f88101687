// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Connection-wide configuration.
//!
//! Design Notes §9 calls for replacing the historical
//! `GetQuicReloadableFlag` global-flag forks with a single struct threaded
//! into the `Session` at construction; this is that struct. Defaults match
//! the numeric semantics of spec.md §4.1 and §4.3.

use core::time::Duration;

/// Which tail-loss-probe delay formula to use (spec.md §4.1, Open
/// Questions). `Ietf1_5` is the default per SPEC_FULL.md §14.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlpVariant {
    /// `max(min_tlp, 0.5 * srtt)`
    HalfRtt,
    /// `max(min_tlp, 1.5 * srtt + max_ack_delay)`
    Ietf1_5,
    /// `max(min_tlp, 2 * srtt + max_ack_delay)`
    Ietf2_0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    /// Initial retransmission-timeout duration, before any RTT sample.
    pub initial_rto: Duration,
    /// Ceiling on the (possibly backed-off) RTO duration.
    pub max_rto: Duration,
    /// Floor under the handshake retransmission delay.
    pub min_handshake_timeout: Duration,
    /// Floor under any computed TLP delay.
    pub min_tlp_delay: Duration,
    /// Number of tail-loss probes to send before falling back to RTO.
    pub max_tail_loss_probes: u32,
    /// Number of oldest in-flight packets retransmitted per RTO.
    pub max_rto_packets: usize,
    pub tlp_variant: TlpVariant,
    /// Bytes a stream may send before yielding to an equal-priority peer
    /// in a single scheduling turn (spec.md Glossary: "batch write").
    pub batch_write_quota_bytes: u64,
    /// High-water mark for a stream's buffered-but-unsent bytes before
    /// `writev_data` starts refusing new data (spec.md §4.2).
    pub max_stream_send_buffer_bytes: u64,
    /// Per-stream maximum total length before `STREAM_LENGTH_OVERFLOW`.
    pub max_stream_length: u64,
    pub initial_max_streams_bidi: u64,
    pub initial_max_streams_uni: u64,
    /// Initial per-stream send/receive flow-control window.
    pub initial_stream_window: u64,
    /// Ceiling a per-stream receive window may grow to.
    pub max_stream_window: u64,
    /// Initial connection-wide receive flow-control window.
    pub initial_connection_window: u64,
    /// Ceiling the connection-wide receive window may grow to.
    pub max_connection_window: u64,
    /// Upper bound on scheduling turns `on_can_write` will take in one
    /// call before yielding back to the caller (spec.md §4.5).
    pub max_write_cycles: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            initial_rto: Duration::from_millis(500),
            max_rto: Duration::from_secs(60),
            min_handshake_timeout: Duration::from_millis(10),
            min_tlp_delay: Duration::from_millis(10),
            max_tail_loss_probes: 2,
            max_rto_packets: 2,
            tlp_variant: TlpVariant::Ietf1_5,
            batch_write_quota_bytes: 16_000,
            max_stream_send_buffer_bytes: 1 << 20,
            max_stream_length: (1u64 << 62) - 1,
            initial_max_streams_bidi: 100,
            initial_max_streams_uni: 100,
            initial_stream_window: 1 << 16,
            max_stream_window: 1 << 24,
            initial_connection_window: 1 << 20,
            max_connection_window: 1 << 26,
            max_write_cycles: 128,
        }
    }
}
