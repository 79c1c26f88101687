// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Wire-level primitives and external collaborator interfaces for the
//! `rquic` transport core.
//!
//! This crate intentionally stays out of frame codec completeness,
//! congestion control algorithms, and cryptographic handshake content —
//! those are collaborators of [`rquic-transport`] reached only through the
//! trait boundaries defined in [`recovery::congestion_controller`] and
//! [`io`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod connection_error;
pub mod counter;
pub mod endpoint;
pub mod frame;
pub mod io;
pub mod packet_number;
pub mod recovery;
pub mod stream_id;
pub mod time;
pub mod transmission;
pub mod varint;
