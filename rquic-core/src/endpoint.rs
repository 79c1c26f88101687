// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Endpoint role types shared across the core.

/// Which role an endpoint plays in a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Client,
    Server,
}

impl Type {
    #[inline]
    pub fn peer_type(self) -> Type {
        match self {
            Type::Client => Type::Server,
            Type::Server => Type::Client,
        }
    }
}

/// Whether an event originated locally or from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Local,
    Remote,
}

impl Location {
    #[inline]
    pub fn is_local(self) -> bool {
        matches!(self, Location::Local)
    }

    #[inline]
    pub fn is_remote(self) -> bool {
        matches!(self, Location::Remote)
    }
}
