// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios exercising the `Session` and `WriteScheduler`
//! together across a connection's lifetime.

use rquic_core::{
    connection_error::StreamErrorCode,
    endpoint,
    recovery::congestion_controller::AlwaysSend,
    stream_id::{StreamId, StreamType},
};
use rquic_transport::{
    config::CoreConfig,
    connection::{ControlSignal, Session},
    recovery::Frame,
};

fn session(local: endpoint::Type) -> Session {
    Session::new(local, CoreConfig::default())
}

#[test]
fn batch_write_budget_yields_to_sibling_after_full_quota() {
    let mut config = CoreConfig::default();
    config.max_write_cycles = 2;
    let mut s = Session::new(endpoint::Type::Client, config);
    let a = s.create_outgoing_bidi_stream().unwrap();
    let b = s.create_outgoing_bidi_stream().unwrap();
    s.stream_write(a, &vec![0u8; 20_000], false).unwrap();
    s.stream_write(b, &vec![0u8; 10], false).unwrap();

    let send = AlwaysSend::default();
    let (frames, _) = s.on_can_write(&send, 0, false, 16_000);
    // a's single frame exhausts its 16,000-byte batch quota in one cycle,
    // so the second cycle must serve b rather than give a a second turn.
    assert_eq!(frames.len(), 2);
    match frames[0] {
        Frame::Stream { stream_id, length, .. } => {
            assert_eq!(stream_id, u64::from(a));
            assert_eq!(length, 16_000);
        }
        _ => panic!("expected a stream frame"),
    }
    match frames[1] {
        Frame::Stream { stream_id, length, .. } => {
            assert_eq!(stream_id, u64::from(b));
            assert_eq!(length, 10);
        }
        _ => panic!("expected a stream frame"),
    }
}

#[test]
fn static_preemption_drains_static_stream_first() {
    let mut s = session(endpoint::Type::Server);
    let static_id = StreamId::nth(endpoint::Type::Server, StreamType::Unidirectional, 0).unwrap();
    s.register_static_stream(static_id);
    let data_id = s.create_outgoing_bidi_stream().unwrap();
    s.write_static_stream(static_id, b"handshake bytes").unwrap();
    s.stream_write(data_id, b"payload", false).unwrap();

    let send = AlwaysSend::default();
    let (frames, _) = s.on_can_write(&send, 0, false, 1200);
    let static_raw = u64::from(static_id);
    let data_raw = u64::from(data_id);
    let static_pos = frames
        .iter()
        .position(|f| matches!(f, Frame::Stream { stream_id, .. } if *stream_id == static_raw))
        .expect("static stream frame");
    let data_pos = frames
        .iter()
        .position(|f| matches!(f, Frame::Stream { stream_id, .. } if *stream_id == data_raw))
        .expect("data stream frame");
    assert!(static_pos < data_pos);
}

#[test]
fn final_offset_via_reset_stream_credits_connection_window() {
    let mut s = session(endpoint::Type::Server);
    let id = StreamId::nth(endpoint::Type::Client, StreamType::Bidirectional, 0).unwrap();
    s.on_stream_frame_received(id, 0, 100, false).unwrap();
    s.on_stream_reset_received(id, 500).unwrap();

    let write_attempt = s.on_stream_frame_received(id, 500, 1, false);
    assert!(write_attempt.is_err());
}

#[test]
fn max_streams_emission_on_third_close_of_five() {
    let mut config = CoreConfig::default();
    config.initial_max_streams_bidi = 5;
    let mut s = Session::new(endpoint::Type::Server, config);

    let ids: Vec<_> = [0u64, 4, 8, 12, 16]
        .iter()
        .map(|n| StreamId::nth(endpoint::Type::Client, StreamType::Bidirectional, *n).unwrap())
        .collect();

    let mut last_signal = None;
    for id in &ids {
        s.on_stream_frame_received(*id, 0, 0, true).unwrap();
        last_signal = s.notify_incoming_stream_closed(*id);
        if last_signal.is_some() {
            break;
        }
    }
    assert_eq!(
        last_signal,
        Some(ControlSignal::MaxStreams {
            stream_type: StreamType::Bidirectional,
            count: 6,
        })
    );
}

#[test]
fn trailing_fin_after_local_reset_is_not_resurrected() {
    let mut s = session(endpoint::Type::Client);
    let id = s.create_outgoing_bidi_stream().unwrap();
    s.stream_write(id, b"hello", false).unwrap();
    s.stream_reset(id, StreamErrorCode::StreamCancelled).unwrap();

    // peer's FIN arrives after the local reset; it must still be credited
    // to connection-level flow control, without resurrecting the stream
    // for further writes.
    s.on_stream_frame_received(id, 0, 0, true).unwrap();

    // the write side stays closed: further writes are silently dropped,
    // never panic, never reopen the stream.
    assert!(s.stream_write(id, b"more", false).is_ok());
}

#[test]
fn empty_fin_past_the_window_is_accepted() {
    let mut s = session(endpoint::Type::Server);
    let id = StreamId::nth(endpoint::Type::Client, StreamType::Bidirectional, 0).unwrap();
    // far past the default 64 KiB per-stream window, but no bytes ride
    // along with this FIN, so nothing is actually being transferred.
    let past_window = CoreConfig::default().initial_stream_window + 1;
    s.on_stream_frame_received(id, past_window, 0, true).unwrap();
}

#[test]
fn goaway_requires_handshake_confirmation() {
    let mut s = session(endpoint::Type::Server);
    let id = StreamId::nth(endpoint::Type::Server, StreamType::Bidirectional, 4).unwrap();
    assert!(s.send_goaway(id).is_err());
    assert!(s.is_closed());
}
