// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-stream and per-connection flow-control windows (spec.md §3, §4.2).

use rquic_core::connection_error::TransportErrorCode;

/// Tracks one direction of flow control: how much the peer has authorised
/// us to send, or how much credit we have extended for receiving.
#[derive(Debug, Clone, Copy)]
pub struct FlowController {
    /// The highest offset the peer has authorised (send side) or the
    /// highest offset we've advertised room for (receive side).
    window_offset: u64,
    /// Bytes actually sent (send side) or consumed by the application
    /// (receive side).
    bytes_transferred: u64,
    max_window: u64,
}

impl FlowController {
    pub fn new(initial_window: u64, max_window: u64) -> Self {
        Self {
            window_offset: initial_window,
            bytes_transferred: 0,
            max_window,
        }
    }

    #[inline]
    pub fn window_offset(&self) -> u64 {
        self.window_offset
    }

    #[inline]
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    #[inline]
    pub fn available(&self) -> u64 {
        self.window_offset.saturating_sub(self.bytes_transferred)
    }

    /// Records that `bytes` more have been sent/received, ending at
    /// absolute offset `new_offset`. Returns an error if this would exceed
    /// the authorised window — the caller maps this to
    /// `FLOW_CONTROL_RECEIVED_TOO_MUCH_DATA` (spec.md §4.2).
    pub fn on_bytes_transferred_to(&mut self, new_offset: u64) -> Result<(), TransportErrorCode> {
        if new_offset > self.window_offset {
            return Err(TransportErrorCode::FlowControlReceivedTooMuchData);
        }
        self.bytes_transferred = self.bytes_transferred.max(new_offset);
        Ok(())
    }

    /// True once half the window has been consumed — the threshold at
    /// which a `WINDOW_UPDATE`/`MAX_STREAM_DATA` should be issued
    /// (spec.md §3).
    pub fn should_update_window(&self) -> bool {
        let consumed = self.bytes_transferred;
        let half = self.window_offset / 2;
        consumed >= half && self.window_offset < self.max_window
    }

    /// Extends the window to cover another half-window's worth of credit,
    /// capped at `max_window`, returning the new offset to advertise.
    pub fn extend_window(&mut self) -> u64 {
        let increment = self.max_window.saturating_sub(self.window_offset).min(self.max_window / 2).max(1);
        self.window_offset = (self.window_offset + increment).min(self.bytes_transferred + self.max_window);
        self.window_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bytes_beyond_window() {
        let mut fc = FlowController::new(100, 1000);
        assert!(fc.on_bytes_transferred_to(100).is_ok());
        assert!(fc.on_bytes_transferred_to(101).is_err());
    }

    #[test]
    fn signals_update_at_half_window() {
        let mut fc = FlowController::new(100, 1000);
        assert!(!fc.should_update_window());
        fc.on_bytes_transferred_to(50).unwrap();
        assert!(fc.should_update_window());
    }
}
