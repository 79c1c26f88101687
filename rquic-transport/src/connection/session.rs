// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection orchestrator: stream lifecycle, admission, the
//! write cycle, and GOAWAY (spec.md §4.5).

use rquic_core::{
    connection_error::{StreamErrorCode, TransportErrorCode},
    endpoint,
    recovery::congestion_controller::SendAlgorithm,
    stream_id::{Direction, StreamId, StreamType},
    varint::VarInt,
};

use crate::{
    config::CoreConfig,
    error::CoreError,
    recovery::Frame,
    stream::{
        stream_id_manager::{Blocked, IncomingStreamIdLimiter, OutgoingStreamIdLimiter},
        FlowController, Stream,
    },
};

use super::{stream_map::StreamMap, write_scheduler::WriteScheduler};

/// The default priority newly created or newly admitted data streams get
/// (spec.md §4.3 has 8 levels, 0..=7; the middle of the range is a
/// reasonable default absent an application hint).
const DEFAULT_PRIORITY: u8 = 3;

fn stream_id_from_raw(raw: u64) -> StreamId {
    StreamId::from_varint(VarInt::new(raw).expect("stream ids are always valid varints once created"))
}

/// A control-plane signal the transport produced that the caller must
/// encode onto the wire; the core itself does no wire encoding (spec.md
/// §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    MaxStreams { stream_type: StreamType, count: u64 },
    StreamsBlocked { stream_type: StreamType, count: u64 },
    Goaway { last_good_stream_id: u64 },
}

pub struct Session {
    local: endpoint::Type,
    config: CoreConfig,
    streams: StreamMap,
    scheduler: WriteScheduler,
    static_stream_ids: hashbrown::HashSet<u64>,
    outgoing_bidi: OutgoingStreamIdLimiter,
    outgoing_uni: OutgoingStreamIdLimiter,
    incoming_bidi: IncomingStreamIdLimiter,
    incoming_uni: IncomingStreamIdLimiter,
    connection_send_flow_control: FlowController,
    connection_recv_flow_control: FlowController,
    handshake_confirmed: bool,
    local_goaway: Option<u64>,
    peer_goaway: Option<u64>,
    fatal_error: Option<TransportErrorCode>,
}

impl Session {
    pub fn new(local: endpoint::Type, config: CoreConfig) -> Self {
        Self {
            local,
            outgoing_bidi: OutgoingStreamIdLimiter::new(local, StreamType::Bidirectional, config.initial_max_streams_bidi),
            outgoing_uni: OutgoingStreamIdLimiter::new(local, StreamType::Unidirectional, config.initial_max_streams_uni),
            incoming_bidi: IncomingStreamIdLimiter::new(local.peer_type(), StreamType::Bidirectional, config.initial_max_streams_bidi),
            incoming_uni: IncomingStreamIdLimiter::new(local.peer_type(), StreamType::Unidirectional, config.initial_max_streams_uni),
            connection_send_flow_control: FlowController::new(config.initial_connection_window, config.max_connection_window),
            connection_recv_flow_control: FlowController::new(config.initial_connection_window, config.max_connection_window),
            streams: StreamMap::new(),
            scheduler: WriteScheduler::new(config.batch_write_quota_bytes),
            static_stream_ids: hashbrown::HashSet::new(),
            handshake_confirmed: false,
            local_goaway: None,
            peer_goaway: None,
            fatal_error: None,
            config,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.fatal_error.is_some()
    }

    fn fatal(&mut self, error: TransportErrorCode) -> CoreError {
        self.fatal_error.get_or_insert(error);
        CoreError::ConnectionFatal(error)
    }

    fn guard_open(&self) -> Result<(), CoreError> {
        if self.fatal_error.is_some() {
            Err(CoreError::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    fn reject_static(&mut self, id: StreamId) -> Result<(), CoreError> {
        if self.static_stream_ids.contains(&u64::from(id)) {
            return Err(self.fatal(TransportErrorCode::InvalidStreamId));
        }
        Ok(())
    }

    fn incoming_limiter_mut(&mut self, stream_type: StreamType) -> &mut IncomingStreamIdLimiter {
        match stream_type {
            StreamType::Bidirectional => &mut self.incoming_bidi,
            StreamType::Unidirectional => &mut self.incoming_uni,
        }
    }

    fn outgoing_limiter_mut(&mut self, stream_type: StreamType) -> &mut OutgoingStreamIdLimiter {
        match stream_type {
            StreamType::Bidirectional => &mut self.outgoing_bidi,
            StreamType::Unidirectional => &mut self.outgoing_uni,
        }
    }

    /// A static stream (crypto, HTTP headers) consumes an id slot but
    /// does not count against the application-visible stream budget
    /// (spec.md §4.4).
    pub fn register_static_stream(&mut self, id: StreamId) {
        let raw = u64::from(id);
        self.static_stream_ids.insert(raw);
        self.scheduler.register_static(raw);
        let local_owned = id.initiator() == self.local;
        if local_owned {
            self.outgoing_limiter_mut(id.stream_type()).reserve_one();
        } else {
            self.incoming_limiter_mut(id.stream_type()).reserve_one();
        }
        let direction = id.direction(self.local);
        let stream = Stream::new(
            id,
            direction,
            0,
            self.config.max_stream_window,
            self.config.max_stream_window,
            self.config.max_stream_window,
        );
        self.streams.insert(stream);
    }

    /// Queues bytes onto a registered static (crypto/headers) stream for
    /// the write cycle to drain — the connection's own control-data path,
    /// distinct from `stream_write` which rejects static ids to keep
    /// application data off the control channel (spec.md §4.5: "receiving
    /// data ... for a static stream is fatal" governs the read side).
    pub fn write_static_stream(&mut self, id: StreamId, bytes: &[u8]) -> Result<(), CoreError> {
        self.guard_open()?;
        if !self.static_stream_ids.contains(&u64::from(id)) {
            return Err(CoreError::InvalidState("not a static stream"));
        }
        let raw = u64::from(id);
        let stream = self
            .streams
            .get_mut(id)
            .ok_or(CoreError::InvalidState("static stream not registered"))?;
        stream
            .write_or_buffer_data(bytes, false, self.config.max_stream_length)
            .map_err(|e| self.fatal(e))?;
        if self.streams.get(id).is_some_and(Stream::has_new_data_to_send) {
            self.scheduler.add_stream(raw);
        }
        Ok(())
    }

    fn create_outgoing(&mut self, stream_type: StreamType) -> Result<StreamId, Blocked> {
        let id = self.outgoing_limiter_mut(stream_type).next_id()?;
        let direction = id.direction(self.local);
        let stream = Stream::new(
            id,
            direction,
            DEFAULT_PRIORITY,
            self.config.initial_stream_window,
            self.config.initial_stream_window,
            self.config.max_stream_window,
        );
        self.streams.insert(stream);
        self.scheduler.register(u64::from(id), DEFAULT_PRIORITY);
        #[cfg(feature = "tracing")]
        tracing::debug!(stream_id = u64::from(id), ?stream_type, "stream_opened");
        Ok(id)
    }

    pub fn create_outgoing_bidi_stream(&mut self) -> Result<StreamId, Blocked> {
        self.create_outgoing(StreamType::Bidirectional)
    }

    pub fn create_outgoing_uni_stream(&mut self) -> Result<StreamId, Blocked> {
        self.create_outgoing(StreamType::Unidirectional)
    }

    /// Admits `id` for receipt of a frame, opening it on first contact if
    /// peer-initiated, and marking all lower same-category ids available
    /// (spec.md §4.5: "Opening a peer-initiated id implicitly marks all
    /// lower same-category ids as available").
    fn admit_for_receive(&mut self, id: StreamId) -> Result<(), CoreError> {
        self.reject_static(id)?;
        if id.direction(self.local) == Direction::WriteOnly {
            return Err(self.fatal(TransportErrorCode::InvalidStreamId));
        }
        if id.initiator() == self.local {
            if !self.streams.contains(id) {
                return Err(self.fatal(TransportErrorCode::InvalidStreamId));
            }
            return Ok(());
        }

        self.incoming_limiter_mut(id.stream_type())
            .admit(id)
            .map_err(|e| self.fatal(e))?;

        if !self.streams.contains(id) {
            let direction = id.direction(self.local);
            let stream = Stream::new(
                id,
                direction,
                DEFAULT_PRIORITY,
                self.config.initial_stream_window,
                self.config.initial_stream_window,
                self.config.max_stream_window,
            );
            self.streams.insert(stream);
            self.scheduler.register(u64::from(id), DEFAULT_PRIORITY);
            #[cfg(feature = "tracing")]
            tracing::debug!(stream_id = u64::from(id), "stream_opened");
        }
        Ok(())
    }

    fn credit_connection_recv_window(&mut self, credit: u64) -> Result<(), CoreError> {
        if credit == 0 {
            return Ok(());
        }
        let new_total = self.connection_recv_flow_control.bytes_transferred() + credit;
        self.connection_recv_flow_control
            .on_bytes_transferred_to(new_total)
            .map_err(|e| self.fatal(e))
    }

    pub fn stream_write(&mut self, id: StreamId, bytes: &[u8], fin: bool) -> Result<(), CoreError> {
        self.guard_open()?;
        self.reject_static(id)?;
        if id.direction(self.local) == Direction::ReadOnly {
            return Err(self.fatal(TransportErrorCode::InvalidStreamId));
        }
        let raw = u64::from(id);
        let stream = self
            .streams
            .get_mut(id)
            .ok_or(CoreError::InvalidState("stream not open"))?;
        stream
            .write_or_buffer_data(bytes, fin, self.config.max_stream_length)
            .map_err(|e| self.fatal(e))?;
        if self.streams.get(id).is_some_and(Stream::has_new_data_to_send) {
            self.scheduler.add_stream(raw);
        }
        Ok(())
    }

    pub fn stream_reset(&mut self, id: StreamId, error: StreamErrorCode) -> Result<Option<Frame>, CoreError> {
        self.guard_open()?;
        self.reject_static(id)?;
        let stream = self
            .streams
            .get_mut(id)
            .ok_or(CoreError::InvalidState("stream not open"))?;
        let frame = stream.reset(error);
        self.streams.reap();
        Ok(frame)
    }

    pub fn on_stop_sending_received(
        &mut self,
        id: StreamId,
        requested_error: StreamErrorCode,
    ) -> Result<Option<Frame>, CoreError> {
        self.guard_open()?;
        self.reject_static(id)?;
        let stream = self
            .streams
            .get_mut(id)
            .ok_or(CoreError::InvalidState("stream not open"))?;
        let frame = stream.on_stop_sending(requested_error);
        self.streams.reap();
        Ok(frame)
    }

    /// A STREAM frame arrived from the peer (spec.md §4.2, §4.5).
    pub fn on_stream_frame_received(&mut self, id: StreamId, offset: u64, length: u64, fin: bool) -> Result<(), CoreError> {
        self.guard_open()?;
        self.admit_for_receive(id)?;
        let end = offset + length;
        let stream = self.streams.get_mut(id).expect("admitted above");
        if stream.final_received_offset().is_some_and(|final_offset| end > final_offset) {
            return Err(self.fatal(TransportErrorCode::FlowControlReceivedTooMuchData));
        }
        // an empty FIN carries no data, so it may legally land past the
        // advertised window — only a real byte range is checked against it.
        if length > 0 {
            let stream = self.streams.get_mut(id).expect("admitted above");
            let previously = stream.recv_flow_control_mut().bytes_transferred();
            if end > previously {
                stream
                    .recv_flow_control_mut()
                    .on_bytes_transferred_to(end)
                    .map_err(|e| self.fatal(e))?;
                let credit = end - previously;
                self.credit_connection_recv_window(credit)?;
            }
        }
        let stream = self.streams.get_mut(id).expect("admitted above");
        if fin {
            stream.on_fin_received(end).map_err(|e| self.fatal(e))?;
        }
        self.streams.reap();
        Ok(())
    }

    /// A RESET_STREAM arrived from the peer (spec.md §4.2 final-offset
    /// semantics, §8 scenario 4).
    pub fn on_stream_reset_received(&mut self, id: StreamId, final_offset: u64) -> Result<(), CoreError> {
        self.guard_open()?;
        self.admit_for_receive(id)?;
        let previously = self
            .streams
            .get_mut(id)
            .expect("admitted above")
            .recv_flow_control_mut()
            .bytes_transferred();
        let transferred = self
            .streams
            .get_mut(id)
            .expect("admitted above")
            .recv_flow_control_mut()
            .on_bytes_transferred_to(final_offset);
        if let Err(e) = transferred {
            return Err(self.fatal(e));
        }
        let reset = self
            .streams
            .get_mut(id)
            .expect("admitted above")
            .on_stream_reset(final_offset);
        if let Err(e) = reset {
            return Err(self.fatal(e));
        }
        let credit = final_offset.saturating_sub(previously);
        self.credit_connection_recv_window(credit)?;
        self.streams.reap();
        Ok(())
    }

    pub fn on_stream_frame_acked(&mut self, id: StreamId, offset: u64, length: u64, fin: bool) -> bool {
        let Some(stream) = self.streams.get_mut(id) else {
            return false;
        };
        let acked = stream.on_stream_frame_acked(offset, length, fin);
        self.streams.reap();
        acked
    }

    pub fn on_stream_frame_lost(&mut self, id: StreamId, offset: u64, length: u64, fin: bool) {
        if let Some(stream) = self.streams.get_mut(id) {
            stream.on_stream_frame_lost(offset, length, fin);
            self.scheduler.add_stream(u64::from(id));
        }
    }

    pub fn on_handshake_confirmed(&mut self) {
        self.handshake_confirmed = true;
    }

    /// `send_goaway` (spec.md §4.5): fatal before handshake completion;
    /// subsequent calls may only lower the advertised id.
    pub fn send_goaway(&mut self, last_good_stream_id: StreamId) -> Result<ControlSignal, CoreError> {
        self.guard_open()?;
        if !self.handshake_confirmed {
            return Err(self.fatal(TransportErrorCode::GoawayProtocolViolation));
        }
        let new_id = u64::from(last_good_stream_id);
        if let Some(previous) = self.local_goaway {
            if new_id > previous {
                return Err(self.fatal(TransportErrorCode::GoawayProtocolViolation));
            }
        }
        self.local_goaway = Some(new_id);
        Ok(ControlSignal::Goaway { last_good_stream_id: new_id })
    }

    /// A GOAWAY arrived from the peer (spec.md §4.5): ids must be
    /// monotonically non-increasing.
    pub fn on_goaway_received(&mut self, last_good_stream_id: u64) -> Result<(), CoreError> {
        self.guard_open()?;
        if let Some(previous) = self.peer_goaway {
            if last_good_stream_id > previous {
                return Err(self.fatal(TransportErrorCode::GoawayProtocolViolation));
            }
        }
        self.peer_goaway = Some(last_good_stream_id);
        Ok(())
    }

    /// `MAX_STREAMS(count)` received (spec.md §4.4).
    pub fn on_max_streams_received(&mut self, stream_type: StreamType, count: u64) {
        self.outgoing_limiter_mut(stream_type).on_max_streams_received(count);
    }

    /// `STREAMS_BLOCKED(count)` received (spec.md §4.4): directionality
    /// mismatch is not modeled here — IETF MAX_STREAMS/STREAMS_BLOCKED
    /// frames are typed per bidi/uni and carry no embedded stream id
    /// whose directionality bit could mismatch (DESIGN.md).
    pub fn on_streams_blocked_received(&mut self, stream_type: StreamType, count: u64) -> Result<Option<ControlSignal>, CoreError> {
        self.guard_open()?;
        #[cfg(feature = "tracing")]
        tracing::trace!(?stream_type, count, "streams_blocked_received");
        let advertised = self
            .incoming_limiter_mut(stream_type)
            .on_streams_blocked_received(count)
            .map_err(|e| self.fatal(e))?;
        #[cfg(feature = "tracing")]
        if let Some(count) = advertised {
            tracing::trace!(?stream_type, count, "max_streams_emitted");
        }
        Ok(advertised.map(|count| ControlSignal::MaxStreams { stream_type, count }))
    }

    /// Notification that a peer-initiated stream has fully closed —
    /// drops it from the stream map if eligible and advances the
    /// MAX_STREAMS credit window (spec.md §4.4, §8 scenario 5).
    pub fn notify_incoming_stream_closed(&mut self, id: StreamId) -> Option<ControlSignal> {
        if id.initiator() == self.local {
            return None;
        }
        self.streams.reap();
        self.streams.remove_if_closed(id);
        #[cfg(feature = "tracing")]
        tracing::debug!(stream_id = u64::from(id), "stream_closed");
        let signal = self
            .incoming_limiter_mut(id.stream_type())
            .on_stream_closed()
            .map(|count| ControlSignal::MaxStreams { stream_type: id.stream_type(), count });
        #[cfg(feature = "tracing")]
        if let Some(ControlSignal::MaxStreams { stream_type, count }) = signal {
            tracing::trace!(?stream_type, count, "max_streams_emitted");
        }
        signal
    }

    /// The write cycle (spec.md §4.5, `on_can_write`): pops ready streams
    /// from the scheduler and drains new data, respecting congestion
    /// control, the packet writer, and connection-level flow control for
    /// non-static streams. Static streams are drained even when
    /// connection-flow-control blocked. Returns the produced frames and
    /// whether the cycle ended application-limited.
    pub fn on_can_write(
        &mut self,
        send_algorithm: &dyn SendAlgorithm,
        bytes_in_flight: u32,
        writer_blocked: bool,
        max_frame_bytes: u64,
    ) -> (Vec<Frame>, bool) {
        let mut frames = Vec::new();
        if self.fatal_error.is_some() || writer_blocked {
            return (frames, false);
        }

        let mut flow_control_starved = false;

        for _ in 0..self.config.max_write_cycles {
            if !send_algorithm.can_send(bytes_in_flight) {
                break;
            }
            let Some(raw_id) = self.scheduler.pop_next_ready() else {
                break;
            };
            let is_static = self.static_stream_ids.contains(&raw_id);

            let budget = if is_static {
                max_frame_bytes
            } else {
                let available = self.connection_send_flow_control.available();
                if available == 0 {
                    flow_control_starved = true;
                    self.scheduler.add_stream(raw_id);
                    continue;
                }
                max_frame_bytes.min(available)
            };

            let id = stream_id_from_raw(raw_id);
            let Some(stream) = self.streams.get_mut(id) else {
                continue;
            };

            if let Some(frame) = stream.take_frame_for_write(budget) {
                if let Frame::Stream { length, .. } = frame {
                    self.scheduler.update_bytes_for_stream(length);
                    if !is_static && length > 0 {
                        let new_total = self.connection_send_flow_control.bytes_transferred() + length;
                        let _ = self.connection_send_flow_control.on_bytes_transferred_to(new_total);
                    }
                }
                frames.push(frame);
            }

            if self.streams.get(id).is_some_and(Stream::has_new_data_to_send) {
                self.scheduler.add_stream(raw_id);
            }
        }

        let application_limited = frames.is_empty() && (flow_control_starved || !self.scheduler.has_ready_streams());
        (frames, application_limited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquic_core::recovery::congestion_controller::AlwaysSend;

    fn new_session() -> Session {
        Session::new(endpoint::Type::Client, CoreConfig::default())
    }

    #[test]
    fn create_and_write_schedules_the_stream() {
        let mut session = new_session();
        let id = session.create_outgoing_bidi_stream().unwrap();
        session.stream_write(id, b"hello", true).unwrap();
        let send_algo = AlwaysSend::default();
        let (frames, _) = session.on_can_write(&send_algo, 0, false, 1024);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0],
            Frame::Stream { stream_id: u64::from(id), offset: 0, length: 5, is_fin: true }
        );
    }

    #[test]
    fn receiving_data_on_a_write_only_local_stream_is_fatal() {
        let mut session = new_session();
        let id = session.create_outgoing_uni_stream().unwrap();
        let err = session.on_stream_frame_received(id, 0, 1, false).unwrap_err();
        assert!(err.is_connection_fatal());
    }

    #[test]
    fn final_offset_via_reset_stream_credits_connection_window() {
        let mut session = new_session();
        let id = StreamId::nth(endpoint::Type::Server, StreamType::Bidirectional, 0).unwrap();
        session.on_stream_frame_received(id, 0, 100, false).unwrap();
        let before = session.connection_recv_flow_control.bytes_transferred();
        assert_eq!(before, 100);

        session.on_stream_reset_received(id, 500).unwrap();
        let after = session.connection_recv_flow_control.bytes_transferred();
        assert_eq!(after - before, 400);
    }

    #[test]
    fn goaway_before_handshake_is_fatal() {
        let mut session = new_session();
        let id = StreamId::initial(endpoint::Type::Client, StreamType::Bidirectional);
        assert!(session.send_goaway(id).is_err());
        assert!(session.is_closed());
    }

    #[test]
    fn goaway_monotonicity_is_enforced_both_directions() {
        let mut session = new_session();
        session.on_handshake_confirmed();
        let high = StreamId::nth(endpoint::Type::Client, StreamType::Bidirectional, 4).unwrap();
        let low = StreamId::nth(endpoint::Type::Client, StreamType::Bidirectional, 1).unwrap();
        session.send_goaway(high).unwrap();
        assert!(session.send_goaway(low).is_ok());

        let mut receiver = new_session();
        receiver.on_goaway_received(4).unwrap();
        assert!(receiver.on_goaway_received(5).is_err());
    }

    #[test]
    fn max_streams_emission_on_third_close() {
        let mut config = CoreConfig::default();
        config.initial_max_streams_bidi = 5;
        let mut session = Session::new(endpoint::Type::Server, config);

        let ids: Vec<StreamId> = (0u64..5)
            .map(|n| StreamId::nth(endpoint::Type::Client, StreamType::Bidirectional, n).unwrap())
            .collect();
        for &id in &ids {
            session.on_stream_frame_received(id, 0, 1, false).unwrap();
        }

        assert!(session.notify_incoming_stream_closed(ids[0]).is_none());
        assert!(session.notify_incoming_stream_closed(ids[1]).is_none());
        let signal = session.notify_incoming_stream_closed(ids[2]).unwrap();
        assert_eq!(signal, ControlSignal::MaxStreams { stream_type: StreamType::Bidirectional, count: 6 });
    }
}
