// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use murmur_common::FrameError;
use std::io;
use thiserror::Error;

/// Why a session ended before (or instead of) a clean end-of-stream.
///
/// Every variant is contained to the session that produced it; none of them
/// reach the listener or other sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("peer unresponsive, outbound queue overflowed")]
    PeerUnresponsive,
    #[error("transport error: {0}")]
    TransportError(#[source] io::Error),
}

impl From<FrameError> for SessionError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io(e) => SessionError::TransportError(e),
            other => SessionError::MalformedFrame(other.to_string()),
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        SessionError::TransportError(e)
    }
}
