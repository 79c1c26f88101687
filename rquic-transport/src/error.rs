// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The closed error enum every fallible public operation returns.
//!
//! Design Notes §9: "prefer a tagged `Result<T, CoreError>` ... connection-
//! fatal errors propagate as one variant that the Session converts into a
//! CONNECTION_CLOSE." Stream-local errors reset only the offending stream
//! (spec.md §7).

use rquic_core::connection_error::{StreamErrorCode, TransportErrorCode};

/// Every error a public operation on the core can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display)]
#[non_exhaustive]
pub enum CoreError {
    /// connection-fatal: {0}
    ConnectionFatal(TransportErrorCode),
    /// stream {stream_id} reset locally: {code}
    StreamLocal { stream_id: u64, code: StreamErrorCode },
    /// operation invalid in the current state: {0}
    InvalidState(&'static str),
    /// all core operations are no-ops after a connection close
    AlreadyClosed,
}

#[cfg(feature = "std")]
impl std::error::Error for CoreError {}

impl CoreError {
    #[inline]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, CoreError::ConnectionFatal(_))
    }

    #[inline]
    pub fn transport_code(&self) -> Option<TransportErrorCode> {
        match self {
            CoreError::ConnectionFatal(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<TransportErrorCode> for CoreError {
    #[inline]
    fn from(code: TransportErrorCode) -> Self {
        CoreError::ConnectionFatal(code)
    }
}
