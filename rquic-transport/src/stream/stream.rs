// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-stream state machine: half-close tracking, FIN delivery, final
//! offset discovery, and the `is_waiting_for_acks` invariant (spec.md
//! §4.2).

use std::vec::Vec;

use rquic_core::{
    connection_error::{StreamErrorCode, TransportErrorCode},
    stream_id::{Direction, StreamId},
    time::Timestamp,
    transmission,
};

use super::{
    flow_control::FlowController,
    send_buffer::SendBuffer,
};
use crate::recovery::Frame;

/// Notified with the count of newly-acked bytes whenever previously
/// unacked bytes transition to acked (spec.md §3, "ack-listener").
pub trait AckListener {
    fn on_bytes_acked(&mut self, bytes: u64);
}

pub type Priority = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    Error(StreamErrorCode),
}

pub struct Stream {
    id: StreamId,
    direction: Direction,
    priority: Priority,
    read_closed: bool,
    write_closed: bool,
    fin_sent: bool,
    fin_lost: bool,
    fin_received: bool,
    final_received_offset: Option<u64>,
    send_buffer: SendBuffer,
    /// Offset up to which buffered data has already been handed to the
    /// write scheduler at least once; everything past it is new data
    /// waiting for a write opportunity.
    next_send_offset: u64,
    fin_flushed: bool,
    send_flow_control: FlowController,
    recv_flow_control: FlowController,
    ttl_deadline: Option<Timestamp>,
    ack_listener: Option<Box<dyn AckListener>>,
    /// Local reset forces `is_waiting_for_acks` false immediately, even if
    /// bytes remain formally unacked (spec.md §4.2).
    locally_reset: bool,
    close_reason: Option<CloseReason>,
}

impl Stream {
    pub fn new(
        id: StreamId,
        direction: Direction,
        priority: Priority,
        initial_send_window: u64,
        initial_recv_window: u64,
        max_recv_window: u64,
    ) -> Self {
        Self {
            id,
            direction,
            priority,
            read_closed: matches!(direction, Direction::WriteOnly),
            write_closed: matches!(direction, Direction::ReadOnly),
            fin_sent: false,
            fin_lost: false,
            fin_received: false,
            final_received_offset: None,
            send_buffer: SendBuffer::new(),
            next_send_offset: 0,
            fin_flushed: false,
            send_flow_control: FlowController::new(initial_send_window, initial_send_window),
            recv_flow_control: FlowController::new(initial_recv_window, max_recv_window),
            ttl_deadline: None,
            ack_listener: None,
            locally_reset: false,
            close_reason: None,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub fn register_ack_listener(&mut self, listener: Box<dyn AckListener>) {
        self.ack_listener = Some(listener);
    }

    pub fn read_closed(&self) -> bool {
        self.read_closed
    }

    pub fn write_closed(&self) -> bool {
        self.write_closed
    }

    pub fn fin_sent(&self) -> bool {
        self.fin_sent
    }

    pub fn final_received_offset(&self) -> Option<u64> {
        self.final_received_offset
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn send_flow_control(&self) -> &FlowController {
        &self.send_flow_control
    }

    pub fn send_flow_control_mut(&mut self) -> &mut FlowController {
        &mut self.send_flow_control
    }

    pub fn recv_flow_control_mut(&mut self) -> &mut FlowController {
        &mut self.recv_flow_control
    }

    /// `write_or_buffer_data(bytes, fin)` (spec.md §4.2).
    pub fn write_or_buffer_data(
        &mut self,
        bytes: &[u8],
        fin: bool,
        max_stream_length: u64,
    ) -> Result<(), TransportErrorCode> {
        if self.write_closed {
            return Ok(());
        }
        if self.fin_sent {
            debug_assert!(false, "write after fin_sent");
            return Err(TransportErrorCode::StreamWriteAfterFinSent);
        }
        let prospective_length = self.send_buffer.written_length() + bytes.len() as u64;
        if prospective_length > max_stream_length {
            return Err(TransportErrorCode::StreamLengthOverflow);
        }
        self.send_buffer.append(bytes);
        if fin {
            self.send_buffer.set_fin();
            self.fin_sent = true;
        }
        Ok(())
    }

    /// `writev_data(iov, fin) → (bytes_consumed, fin_consumed)` (spec.md
    /// §4.2). Respects `max_buffered_bytes` unless nothing is buffered yet,
    /// in which case it always accepts at least the supplied data.
    pub fn writev_data(
        &mut self,
        iov: &[&[u8]],
        fin: bool,
        max_buffered_bytes: u64,
        max_stream_length: u64,
    ) -> Result<(usize, bool), TransportErrorCode> {
        if self.fin_sent || self.write_closed {
            return Ok((0, false));
        }
        let total_len: usize = iov.iter().map(|s| s.len()).sum();
        let buffered = self.send_buffer.outstanding_bytes();
        if buffered > 0 && buffered >= max_buffered_bytes {
            return Ok((0, false));
        }

        let prospective_length = self.send_buffer.written_length() + total_len as u64;
        if prospective_length > max_stream_length {
            return Err(TransportErrorCode::StreamLengthOverflow);
        }

        for chunk in iov {
            self.send_buffer.append(chunk);
        }
        if fin {
            self.send_buffer.set_fin();
            self.fin_sent = true;
        }
        Ok((total_len, fin))
    }

    /// `on_stream_frame_acked(offset, length, fin, ack_delay) →
    /// new_data_acked_bool` (spec.md §4.2).
    pub fn on_stream_frame_acked(&mut self, offset: u64, length: u64, fin: bool) -> bool {
        let outcome = self.send_buffer.acknowledge_interval(offset, length, fin);
        let new_data_acked = outcome.newly_acked_bytes > 0 || outcome.fin_newly_acked;
        if new_data_acked {
            if let Some(listener) = self.ack_listener.as_mut() {
                listener.on_bytes_acked(outcome.newly_acked_bytes);
            }
        }
        new_data_acked
    }

    /// `on_stream_frame_lost(offset, length, fin)` (spec.md §4.2).
    pub fn on_stream_frame_lost(&mut self, offset: u64, length: u64, fin: bool) {
        self.send_buffer.mark_lost_interval(offset, length);
        if fin && self.fin_sent && !self.send_buffer.fin_acked() {
            self.fin_lost = true;
        }
    }

    pub fn needs_retransmission(&self) -> bool {
        self.send_buffer.has_lost_ranges() || self.fin_lost
    }

    /// Whether this stream has data buffered that has never been handed
    /// to the write scheduler, counting a buffered-but-unflushed FIN.
    pub fn has_new_data_to_send(&self) -> bool {
        self.next_send_offset < self.send_buffer.written_length() || (self.fin_sent && !self.fin_flushed)
    }

    /// Takes up to `max_bytes` of never-before-sent data as a single
    /// frame, advancing the first-transmission cursor (spec.md §4.5,
    /// `on_can_write`). Returns `None` if there is nothing new to send.
    pub fn take_frame_for_write(&mut self, max_bytes: u64) -> Option<Frame> {
        if max_bytes > 0 && self.next_send_offset < self.send_buffer.written_length() {
            let remaining = self.send_buffer.written_length() - self.next_send_offset;
            let take = remaining.min(max_bytes);
            let start = self.next_send_offset;
            self.next_send_offset += take;
            let reaches_end = self.next_send_offset == self.send_buffer.written_length();
            let is_fin = reaches_end && self.fin_sent && !self.fin_flushed;
            if is_fin {
                self.fin_flushed = true;
            }
            Some(Frame::Stream {
                stream_id: u64::from(self.id),
                offset: start,
                length: take,
                is_fin,
            })
        } else if self.fin_sent && !self.fin_flushed {
            self.fin_flushed = true;
            Some(Frame::Stream {
                stream_id: u64::from(self.id),
                offset: self.send_buffer.written_length(),
                length: 0,
                is_fin: true,
            })
        } else {
            None
        }
    }

    /// `retransmit_stream_data(offset, length, fin, type) →
    /// all_consumed_bool` (spec.md §4.2): re-submits the requested range,
    /// skipping any sub-range already acked, up to `max_bytes`.
    pub fn retransmit_stream_data(
        &mut self,
        offset: u64,
        length: u64,
        fin: bool,
        transmission_type: transmission::Type,
        max_bytes: u64,
    ) -> (Vec<Frame>, bool) {
        let _ = transmission_type;
        let mut frames = Vec::new();
        let mut budget = max_bytes;
        let mut all_consumed = true;

        for (start, end) in self.send_buffer.unacked_subranges(offset, length) {
            let want = end - start;
            let take = want.min(budget);
            if take == 0 {
                all_consumed = false;
                continue;
            }
            frames.push(Frame::Stream {
                stream_id: u64::from(self.id),
                offset: start,
                length: take,
                is_fin: false,
            });
            budget -= take;
            if take < want {
                all_consumed = false;
            }
        }

        if fin && self.fin_lost {
            if budget > 0 || frames.is_empty() {
                frames.push(Frame::Stream {
                    stream_id: u64::from(self.id),
                    offset: self.send_buffer.written_length(),
                    length: 0,
                    is_fin: true,
                });
                self.fin_lost = false;
            } else {
                all_consumed = false;
            }
        }

        self.send_buffer.take_lost_ranges();
        (frames, all_consumed)
    }

    /// `reset(error)` (spec.md §4.2): if no FIN has been sent, transmit
    /// RESET_STREAM. After a local reset the stream stops waiting for
    /// acks.
    pub fn reset(&mut self, error: StreamErrorCode) -> Option<Frame> {
        #[cfg(feature = "tracing")]
        tracing::debug!(stream_id = u64::from(self.id), ?error, "stream_reset");
        self.locally_reset = true;
        self.write_closed = true;
        self.close_reason = Some(CloseReason::Error(error));
        // every application-driven reset here carries a real error code;
        // there is no "no error" sentinel to special-case (DESIGN.md).
        self.send_buffer.abandon_unacked();
        self.fin_lost = false;
        self.next_send_offset = self.send_buffer.written_length();
        self.fin_flushed = true;

        if self.fin_sent {
            None
        } else {
            self.fin_sent = true;
            Some(Frame::Stream {
                stream_id: u64::from(self.id),
                offset: self.send_buffer.written_length(),
                length: 0,
                is_fin: false,
            })
        }
    }

    /// `on_stream_reset(frame)` (spec.md §4.2): records the peer's final
    /// offset and closes the read side. Does not implicitly close the
    /// write side — the peer must send STOP_SENDING for that.
    pub fn on_stream_reset(&mut self, final_offset: u64) -> Result<(), TransportErrorCode> {
        self.record_final_offset(final_offset)?;
        self.read_closed = true;
        if self.close_reason.is_none() {
            self.close_reason = Some(CloseReason::Error(StreamErrorCode::StreamCancelled));
        }
        Ok(())
    }

    /// `on_stop_sending` → triggers a local RESET_STREAM with the
    /// requested error code (spec.md §4.2).
    pub fn on_stop_sending(&mut self, requested_error: StreamErrorCode) -> Option<Frame> {
        self.reset(requested_error)
    }

    /// First-authoritative-value-wins final offset discovery (spec.md
    /// §4.2): a FIN's `offset + length`, a RESET_STREAM's `final_size`, or
    /// a legacy trailing-header pseudo-header (not modeled here — the
    /// HTTP/3 collaborator interface replaces it, per spec.md §9).
    pub fn record_final_offset(&mut self, offset: u64) -> Result<(), TransportErrorCode> {
        match self.final_received_offset {
            Some(existing) if existing != offset => {
                Err(TransportErrorCode::FlowControlReceivedTooMuchData)
            }
            _ => {
                self.final_received_offset = Some(offset);
                Ok(())
            }
        }
    }

    pub fn on_fin_received(&mut self, offset: u64) -> Result<(), TransportErrorCode> {
        self.record_final_offset(offset)?;
        self.fin_received = true;
        self.read_closed = true;
        Ok(())
    }

    /// `on_connection_closed(error, source)` (spec.md §4.2): the stream
    /// stops waiting for acks regardless of local or remote origin.
    pub fn on_connection_closed(&mut self) {
        self.locally_reset = true;
        self.send_buffer.abandon_unacked();
    }

    /// `maybe_set_ttl(duration)` (spec.md §4.2).
    pub fn set_ttl_deadline(&mut self, deadline: Timestamp) {
        self.ttl_deadline = Some(deadline);
    }

    pub fn ttl_expired(&self, now: Timestamp) -> bool {
        self.ttl_deadline.is_some_and(|deadline| now > deadline)
    }

    /// The is-waiting-for-acks invariant (spec.md §4.2).
    pub fn is_waiting_for_acks(&self) -> bool {
        if self.locally_reset {
            return false;
        }
        self.send_buffer.outstanding_bytes() > 0 || (self.fin_sent && !self.send_buffer.fin_acked())
    }

    /// A stream is a zombie iff both half-closes have happened but it is
    /// still waiting for acks (spec.md §3).
    pub fn is_zombie(&self) -> bool {
        self.read_closed && self.write_closed && self.is_waiting_for_acks()
    }

    pub fn is_closed(&self) -> bool {
        self.read_closed && self.write_closed && !self.is_waiting_for_acks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquic_core::endpoint;

    fn make_stream() -> Stream {
        let id = StreamId::initial(endpoint::Type::Client, rquic_core::stream_id::StreamType::Bidirectional);
        Stream::new(id, Direction::Bidirectional, 3, 1 << 20, 1 << 20, 1 << 20)
    }

    #[test]
    fn write_after_length_overflow_is_fatal() {
        let mut s = make_stream();
        let err = s.write_or_buffer_data(b"hello", false, 3).unwrap_err();
        assert_eq!(err, TransportErrorCode::StreamLengthOverflow);
    }

    #[test]
    fn writev_respects_high_water_mark_unless_empty() {
        let mut s = make_stream();
        let (consumed, _) = s.writev_data(&[b"0123456789"], false, 5, 1 << 20).unwrap();
        // buffered was zero, so the full write is always accepted
        assert_eq!(consumed, 10);
        let (consumed2, _) = s.writev_data(&[b"more"], false, 5, 1 << 20).unwrap();
        assert_eq!(consumed2, 0);
    }

    #[test]
    fn fin_ack_alone_still_reports_new_data() {
        let mut s = make_stream();
        s.write_or_buffer_data(b"hi", true, 1 << 20).unwrap();
        assert!(s.is_waiting_for_acks());
        s.on_stream_frame_acked(0, 2, false);
        assert!(s.is_waiting_for_acks(), "fin not yet acked");
        let new_data = s.on_stream_frame_acked(2, 0, true);
        assert!(new_data);
        assert!(!s.is_waiting_for_acks());
    }

    #[test]
    fn local_reset_stops_waiting_for_acks_immediately() {
        let mut s = make_stream();
        s.write_or_buffer_data(b"unacked", false, 1 << 20).unwrap();
        assert!(s.is_waiting_for_acks());
        s.reset(StreamErrorCode::StreamCancelled);
        assert!(!s.is_waiting_for_acks());
    }

    #[test]
    fn take_frame_for_write_flushes_fin_once() {
        let mut s = make_stream();
        s.write_or_buffer_data(b"hi", true, 1 << 20).unwrap();
        let frame = s.take_frame_for_write(1).unwrap();
        assert_eq!(frame, Frame::Stream { stream_id: 0, offset: 0, length: 1, is_fin: false });
        assert!(s.has_new_data_to_send());
        let frame2 = s.take_frame_for_write(10).unwrap();
        assert_eq!(frame2, Frame::Stream { stream_id: 0, offset: 1, length: 1, is_fin: true });
        assert!(!s.has_new_data_to_send());
        assert!(s.take_frame_for_write(10).is_none());
    }

    #[test]
    fn final_offset_contradiction_is_fatal() {
        let mut s = make_stream();
        s.record_final_offset(500).unwrap();
        let err = s.record_final_offset(600).unwrap_err();
        assert_eq!(err, TransportErrorCode::FlowControlReceivedTooMuchData);
    }
}
