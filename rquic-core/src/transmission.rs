// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Transmission-type tagging for sent packets (spec.md §3, §4.1).
//!
//! Every packet is tagged with the reason it was sent. The tag drives two
//! independent classification questions the sent-packet manager asks of
//! every retransmission: does it keep the original packet's bytes counted
//! against the congestion window pending loss detection
//! ([`Type::leaves_bytes_in_flight`]), and are its frames retransmitted
//! directly rather than routed through a notifier
//! ([`Type::should_force_retransmission`]).

/// Why a packet was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// An original transmission, not a retransmission of anything.
    NotRetransmission,
    /// Retransmitting handshake (crypto) data that has not been
    /// acknowledged within the handshake timeout.
    Handshake,
    /// Retransmitting data reported lost by the loss detector.
    Loss,
    /// A tail loss probe: speculative retransmission sent before RTO fires,
    /// to provoke an ACK that might avoid a full RTO.
    Tlp,
    /// A retransmission-timeout retransmission.
    Rto,
    /// A probe packet sent to validate a path or elicit an ACK, carrying no
    /// application-meaningful retransmission.
    Probing,
    /// Every outstanding Initial-space packet, re-sent as a unit (used when
    /// discarding Initial keys would otherwise strand them).
    AllInitial,
    /// Every outstanding packet in every space, re-sent as a unit.
    AllUnacked,
}

impl Type {
    /// True for TLP, PROBING, and RTO: these transmission types keep the
    /// *original* packet's in-flight bit set, pending loss detection,
    /// because we don't yet know whether the original was actually lost or
    /// merely slow.
    #[inline]
    pub fn leaves_bytes_in_flight(self) -> bool {
        matches!(self, Type::Tlp | Type::Probing | Type::Rto)
    }

    /// True for HANDSHAKE, TLP, PROBING, and RTO: for these the frames are
    /// retransmitted directly. For LOSS, frames are reported to a notifier
    /// which may retransmit selectively (e.g. only the still-unacked
    /// sub-range of a stream's bytes).
    #[inline]
    pub fn should_force_retransmission(self) -> bool {
        matches!(self, Type::Handshake | Type::Tlp | Type::Probing | Type::Rto)
    }

    /// Handshake packets must never themselves carry a PROBING
    /// retransmission (spec.md §4.1).
    #[inline]
    pub fn valid_for_handshake_packet(self) -> bool {
        !matches!(self, Type::Probing)
    }
}

/// The lifecycle state of a tracked (sent) packet (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Sent and not yet resolved.
    Outstanding,
    /// Acknowledged by the peer.
    Acked,
    /// Declared lost by the loss detector.
    Lost,
    /// No longer tracked because its encryption level was retired.
    Neutered,
    /// Will never be acknowledged (e.g. a pure PING used only to keep a
    /// path alive past its validation window).
    Unackable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_spec_table() {
        for (t, leaves, forces) in [
            (Type::NotRetransmission, false, false),
            (Type::Handshake, false, true),
            (Type::Loss, false, false),
            (Type::Tlp, true, true),
            (Type::Rto, true, true),
            (Type::Probing, true, true),
            (Type::AllInitial, false, false),
            (Type::AllUnacked, false, false),
        ] {
            assert_eq!(t.leaves_bytes_in_flight(), leaves, "{t:?} leaves_bytes_in_flight");
            assert_eq!(t.should_force_retransmission(), forces, "{t:?} should_force_retransmission");
        }
    }

    #[test]
    fn handshake_packets_reject_probing() {
        assert!(!Type::Probing.valid_for_handshake_packet());
        assert!(Type::Handshake.valid_for_handshake_packet());
    }
}
