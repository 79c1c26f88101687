// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The outgoing byte stream of a single `Stream`, keyed by absolute
//! offset (spec.md §3, §4.2).
//!
//! Acked bytes are dropped from the front once contiguous with the base
//! offset, bounding memory to the in-flight window rather than the whole
//! stream's lifetime, mirroring the front-truncating-ring idea
//! `UnackedPacketMap` uses for packet numbers. Storage is `BytesMut` so
//! that drop is a pointer advance, not a byte-by-byte shift.

use bytes::{Buf, BytesMut};

/// A half-open, absolute byte range `[start, end)`.
pub type Range = (u64, u64);

fn ranges_overlap(a: Range, b: Range) -> bool {
    a.0 < b.1 && b.0 < a.1
}

fn intersect(a: Range, b: Range) -> Option<Range> {
    let start = a.0.max(b.0);
    let end = a.1.min(b.1);
    if start < end {
        Some((start, end))
    } else {
        None
    }
}

/// Merges `new_range` into a sorted, disjoint set of ranges, returning the
/// total length that was not already covered.
fn merge_range(set: &mut Vec<Range>, new_range: Range) -> u64 {
    if new_range.0 >= new_range.1 {
        return 0;
    }
    let mut novel = new_range.1 - new_range.0;
    for &(s, e) in set.iter() {
        if let Some((os, oe)) = intersect((s, e), new_range) {
            novel -= oe - os;
        }
    }

    set.push(new_range);
    set.sort_unstable_by_key(|r| r.0);
    let mut merged: Vec<Range> = Vec::with_capacity(set.len());
    for &(s, e) in set.iter() {
        if let Some(last) = merged.last_mut() {
            if s <= last.1 {
                last.1 = last.1.max(e);
                continue;
            }
        }
        merged.push((s, e));
    }
    *set = merged;
    novel
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AckOutcome {
    pub newly_acked_bytes: u64,
    pub fin_newly_acked: bool,
}

/// The outgoing byte stream of a stream, plus bookkeeping for which bytes
/// have been acked or are pending retransmission after loss.
#[derive(Debug, Default)]
pub struct SendBuffer {
    data: BytesMut,
    /// Absolute offset of `data[0]`.
    base_offset: u64,
    /// Total bytes ever appended (== `base_offset + data.len()`).
    written_length: u64,
    acked: Vec<Range>,
    lost: Vec<Range>,
    fin_offset: Option<u64>,
    fin_acked: bool,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn written_length(&self) -> u64 {
        self.written_length
    }

    #[inline]
    pub fn fin_offset(&self) -> Option<u64> {
        self.fin_offset
    }

    #[inline]
    pub fn fin_acked(&self) -> bool {
        self.fin_acked
    }

    /// Appends bytes to the stream, returning their absolute offset range.
    pub fn append(&mut self, bytes: &[u8]) -> Range {
        let start = self.written_length;
        self.data.extend_from_slice(bytes);
        self.written_length += bytes.len() as u64;
        (start, self.written_length)
    }

    /// Marks the offset immediately after the last appended byte as
    /// carrying FIN. A no-op if FIN has already been recorded at the same
    /// offset.
    pub fn set_fin(&mut self) {
        if self.fin_offset.is_none() {
            self.fin_offset = Some(self.written_length);
        }
    }

    pub fn acked_bytes(&self) -> u64 {
        self.acked.iter().map(|&(s, e)| e - s).sum()
    }

    pub fn outstanding_bytes(&self) -> u64 {
        (self.written_length - self.base_offset) - self.acked_bytes()
    }

    /// Reads up to `max_len` bytes starting at `offset`, for (re)transmission.
    /// Returns `None` if `offset` has already been dropped from the buffer.
    pub fn read_at_offset(&self, offset: u64, max_len: u64) -> Option<Vec<u8>> {
        if offset < self.base_offset || offset > self.written_length {
            return None;
        }
        let start_idx = (offset - self.base_offset) as usize;
        let available = self.data.len() - start_idx;
        let len = available.min(max_len as usize);
        Some(self.data[start_idx..start_idx + len].to_vec())
    }

    /// The unacked sub-ranges of `[offset, offset + length)`, in ascending
    /// order — what `retransmit_stream_data` actually needs to resend
    /// after skipping any sub-range already acked (spec.md §4.2).
    pub fn unacked_subranges(&self, offset: u64, length: u64) -> Vec<Range> {
        let requested = (offset, offset + length);
        let mut pieces = vec![requested];
        for &acked in &self.acked {
            if !ranges_overlap(acked, requested) {
                continue;
            }
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for piece in pieces {
                if !ranges_overlap(piece, acked) {
                    next.push(piece);
                    continue;
                }
                if piece.0 < acked.0 {
                    next.push((piece.0, acked.0));
                }
                if acked.1 < piece.1 {
                    next.push((acked.1, piece.1));
                }
            }
            pieces = next;
        }
        pieces
    }

    /// `acknowledge_interval` (spec.md §4.2): may be called multiple
    /// times, possibly out of order, for overlapping or disjoint ranges.
    /// Only the first transition of a byte to acked counts toward the
    /// returned delta.
    pub fn acknowledge_interval(&mut self, offset: u64, length: u64, fin: bool) -> AckOutcome {
        let newly_acked_bytes = merge_range(&mut self.acked, (offset, offset + length));

        let fin_newly_acked = fin && !self.fin_acked && self.fin_offset.is_some();
        if fin {
            self.fin_acked = true;
        }

        self.compact_front();

        AckOutcome {
            newly_acked_bytes,
            fin_newly_acked,
        }
    }

    /// `mark_lost_interval` (spec.md §4.2): records that the next write
    /// opportunity should retransmit these bytes before any new data.
    /// Never marks already-acked bytes as lost.
    pub fn mark_lost_interval(&mut self, offset: u64, length: u64) {
        for (start, end) in self.unacked_subranges(offset, length) {
            merge_range(&mut self.lost, (start, end));
        }
    }

    /// Takes and clears the pending-retransmission ranges, in ascending
    /// order, for the caller to resend.
    pub fn take_lost_ranges(&mut self) -> Vec<Range> {
        core::mem::take(&mut self.lost)
    }

    pub fn has_lost_ranges(&self) -> bool {
        !self.lost.is_empty()
    }

    /// Drops fully-acked bytes from the front of the buffer once they are
    /// contiguous with `base_offset`, bounding memory use (spec.md §3,
    /// invariant: acked ⊆ written).
    fn compact_front(&mut self) {
        loop {
            let Some(&(start, end)) = self.acked.first() else {
                break;
            };
            if start > self.base_offset {
                break;
            }
            let drop_to = end.min(self.written_length);
            if drop_to <= self.base_offset {
                break;
            }
            let drop_count = (drop_to - self.base_offset) as usize;
            self.data.advance(drop_count);
            self.base_offset = drop_to;
            if end <= self.base_offset {
                self.acked.remove(0);
            } else {
                self.acked[0].0 = self.base_offset;
            }
        }
    }

    /// Discards all unacked state: nothing further will be retransmitted.
    /// Used by `reset` with a non-"no error" code and by connection close
    /// (spec.md §4.2).
    pub fn abandon_unacked(&mut self) {
        self.lost.clear();
        let full = (self.base_offset, self.written_length);
        merge_range(&mut self.acked, full);
        self.compact_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_back() {
        let mut buf = SendBuffer::new();
        let range = buf.append(b"hello");
        assert_eq!(range, (0, 5));
        assert_eq!(buf.read_at_offset(0, 5).unwrap(), b"hello");
        assert_eq!(buf.read_at_offset(2, 2).unwrap(), b"ll");
    }

    #[test]
    fn overlapping_acks_count_new_bytes_once() {
        let mut buf = SendBuffer::new();
        buf.append(b"0123456789");
        let first = buf.acknowledge_interval(0, 5, false);
        assert_eq!(first.newly_acked_bytes, 5);
        let second = buf.acknowledge_interval(3, 5, false);
        // bytes 3..5 already acked, only 5..8 are new
        assert_eq!(second.newly_acked_bytes, 3);
    }

    #[test]
    fn fin_ack_reports_zero_bytes() {
        let mut buf = SendBuffer::new();
        buf.append(b"hi");
        buf.set_fin();
        let outcome = buf.acknowledge_interval(2, 0, true);
        assert_eq!(outcome.newly_acked_bytes, 0);
        assert!(outcome.fin_newly_acked);
        assert!(buf.fin_acked());
    }

    #[test]
    fn compaction_frees_acked_prefix() {
        let mut buf = SendBuffer::new();
        buf.append(b"0123456789");
        buf.acknowledge_interval(0, 5, false);
        assert_eq!(buf.outstanding_bytes(), 5);
        assert_eq!(buf.read_at_offset(0, 5), None);
        assert_eq!(buf.read_at_offset(5, 5).unwrap(), b"56789");
    }

    #[test]
    fn retransmit_skips_acked_subranges() {
        let mut buf = SendBuffer::new();
        buf.append(b"0123456789");
        buf.acknowledge_interval(2, 3, false); // acks [2,5)
        let pieces = buf.unacked_subranges(0, 10);
        assert_eq!(pieces, vec![(0, 2), (5, 10)]);
    }

    #[test]
    fn mark_lost_never_includes_acked_bytes() {
        let mut buf = SendBuffer::new();
        buf.append(b"0123456789");
        buf.acknowledge_interval(0, 4, false);
        buf.mark_lost_interval(0, 10);
        let lost = buf.take_lost_ranges();
        assert_eq!(lost, vec![(4, 10)]);
    }
}
