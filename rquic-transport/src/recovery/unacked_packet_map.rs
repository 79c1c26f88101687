// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The ordered collection of outstanding packets a `SentPacketManager`
//! tracks for a single packet-number space (spec.md §3).

use rquic_core::{time::Timestamp, transmission};
use std::collections::VecDeque;
use smallvec::SmallVec;

/// A retransmittable unit of data carried by a packet. The sent-packet
/// manager never interprets these beyond handing them back to the caller
/// on loss/ack/retransmission; stream-level meaning lives in
/// `crate::stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Stream {
        stream_id: u64,
        offset: u64,
        length: u64,
        is_fin: bool,
    },
    Crypto,
    /// A PING sent purely to keep a path alive or elicit an ACK; carries no
    /// application data to retransmit on loss.
    Ping,
}

/// One tracked sent packet (spec.md §3).
#[derive(Debug, Clone)]
pub struct TransmissionInfo {
    pub packet_number: u64,
    pub sent_time: Timestamp,
    pub bytes_sent: u32,
    pub retransmittable_frames: SmallVec<[Frame; 4]>,
    pub in_flight: bool,
    pub has_crypto_handshake: bool,
    pub transmission_type: transmission::Type,
    pub state: transmission::State,
    /// If this packet is itself a retransmission, the packet number it
    /// retransmits. Cross-references are resolved by packet number through
    /// `UnackedPacketMap::get`, never by pointer (Design Notes §9).
    pub original_packet_number: Option<u64>,
}

impl TransmissionInfo {
    #[inline]
    pub fn has_retransmittable_data(&self) -> bool {
        !self.retransmittable_frames.is_empty()
    }

    #[inline]
    pub fn is_ack_eliciting(&self) -> bool {
        self.has_retransmittable_data()
    }
}

/// Outstanding packets for one packet-number space, indexed by packet
/// number with a moving least-unacked (spec.md §3).
///
/// Packet numbers within a space are assigned consecutively by
/// `on_packet_sent`, so the backing store is a plain ring buffer indexed
/// by `packet_number - least_unacked`: no gaps, no hashing.
#[derive(Debug, Default)]
pub struct UnackedPacketMap {
    /// Packet number of `entries[0]`, once an entry has been inserted.
    base: u64,
    entries: VecDeque<TransmissionInfo>,
    bytes_in_flight: u64,
}

impl UnackedPacketMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    /// The lowest packet number not yet removed from the front (acked or
    /// neutered). Strictly increasing over time (spec.md §8).
    #[inline]
    pub fn least_unacked(&self) -> u64 {
        self.base
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, info: TransmissionInfo) {
        if self.entries.is_empty() {
            self.base = info.packet_number;
        } else {
            debug_assert_eq!(
                info.packet_number,
                self.base + self.entries.len() as u64,
                "packet numbers must increase strictly and without gaps"
            );
        }
        if info.in_flight {
            self.bytes_in_flight += info.bytes_sent as u64;
        }
        self.entries.push_back(info);
    }

    fn index_of(&self, packet_number: u64) -> Option<usize> {
        if packet_number < self.base {
            return None;
        }
        let idx = (packet_number - self.base) as usize;
        if idx < self.entries.len() {
            Some(idx)
        } else {
            None
        }
    }

    pub fn get(&self, packet_number: u64) -> Option<&TransmissionInfo> {
        self.index_of(packet_number).map(|i| &self.entries[i])
    }

    pub fn get_mut(&mut self, packet_number: u64) -> Option<&mut TransmissionInfo> {
        self.index_of(packet_number).map(move |i| &mut self.entries[i])
    }

    /// Clears the in-flight bit on a packet, adjusting `bytes_in_flight`.
    /// A no-op if the packet is already not in flight.
    pub fn remove_in_flight(&mut self, packet_number: u64) {
        if let Some(info) = self.get_mut(packet_number) {
            if info.in_flight {
                info.in_flight = false;
                let bytes_sent = info.bytes_sent as u64;
                self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_sent);
            }
        }
    }

    /// Drops front entries whose state is ACKED or NEUTERED, advancing
    /// `least_unacked` (spec.md §3, invariant b).
    pub fn compact_front(&mut self) {
        while let Some(front) = self.entries.front() {
            if matches!(
                front.state,
                transmission::State::Acked | transmission::State::Neutered
            ) {
                self.entries.pop_front();
                self.base += 1;
            } else {
                break;
            }
        }
    }

    /// Iterates outstanding (still `Outstanding`) packets in ascending
    /// packet-number order.
    pub fn iter_outstanding(&self) -> impl Iterator<Item = &TransmissionInfo> {
        self.entries
            .iter()
            .filter(|info| info.state == transmission::State::Outstanding)
    }

    pub fn largest_sent_packet_number(&self) -> Option<u64> {
        self.entries.back().map(|i| i.packet_number)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn info(pn: u64) -> TransmissionInfo {
        TransmissionInfo {
            packet_number: pn,
            sent_time: Timestamp::from_duration(Duration::from_secs(pn)),
            bytes_sent: 100,
            retransmittable_frames: SmallVec::new(),
            in_flight: true,
            has_crypto_handshake: false,
            transmission_type: transmission::Type::NotRetransmission,
            state: transmission::State::Outstanding,
            original_packet_number: None,
        }
    }

    #[test]
    fn bytes_in_flight_tracks_in_flight_entries() {
        let mut map = UnackedPacketMap::new();
        map.insert(info(0));
        map.insert(info(1));
        assert_eq!(map.bytes_in_flight(), 200);
        map.remove_in_flight(0);
        assert_eq!(map.bytes_in_flight(), 100);
    }

    #[test]
    fn compact_front_advances_least_unacked() {
        let mut map = UnackedPacketMap::new();
        map.insert(info(0));
        map.insert(info(1));
        map.insert(info(2));
        map.get_mut(0).unwrap().state = transmission::State::Acked;
        map.get_mut(1).unwrap().state = transmission::State::Acked;
        map.compact_front();
        assert_eq!(map.least_unacked(), 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn compact_front_stops_at_gap() {
        let mut map = UnackedPacketMap::new();
        map.insert(info(0));
        map.insert(info(1));
        map.get_mut(1).unwrap().state = transmission::State::Acked;
        map.compact_front();
        // packet 0 still outstanding, so nothing is removed despite 1 being acked
        assert_eq!(map.least_unacked(), 0);
        assert_eq!(map.len(), 2);
    }

    #[test]
    #[should_panic]
    fn insert_rejects_gaps() {
        let mut map = UnackedPacketMap::new();
        map.insert(info(0));
        map.insert(info(5));
    }
}
