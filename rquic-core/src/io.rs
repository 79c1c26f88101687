// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The packet-writer collaborator interface (spec.md §6).
//!
//! UDP I/O itself is out of scope (spec.md §1); the core only needs to
//! know whether a write would block.

/// Outcome of a single `write_packet` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// `n` bytes were written to the socket.
    Ok(usize),
    /// The underlying socket would block; try again once writable.
    Blocked,
}

/// Sends already-encoded packet bytes to the network.
pub trait PacketWriter {
    type PeerAddress;
    type LocalAddress;

    fn write_packet(
        &mut self,
        bytes: &[u8],
        peer_addr: &Self::PeerAddress,
        local_addr: &Self::LocalAddress,
    ) -> WriteOutcome;

    fn is_write_blocked(&self) -> bool;
}
