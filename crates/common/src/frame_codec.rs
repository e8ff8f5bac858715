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

//! Length-prefixed framing for relay connections.
//!
//! Every frame on the wire is a 4-byte big-endian payload length followed by
//! exactly that many payload bytes. Concatenated or split reads therefore
//! always reassemble into the frames the peer actually wrote.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Width of the length prefix, in bytes.
pub const PREFIX_LENGTH: usize = 4;

/// Largest payload accepted unless the codec is configured otherwise.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame of {length} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },
    #[error("stream ended mid-frame with {buffered} bytes buffered")]
    Truncated { buffered: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Codec producing one `Bytes` payload per length-prefixed frame.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_length: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < PREFIX_LENGTH {
            return Ok(None);
        }

        let mut prefix = [0u8; PREFIX_LENGTH];
        prefix.copy_from_slice(&buf[..PREFIX_LENGTH]);
        let length = u32::from_be_bytes(prefix) as usize;

        // Checked before reserving so a hostile prefix never drives allocation.
        if length > self.max_length {
            return Err(FrameError::FrameTooLarge {
                length,
                max: self.max_length,
            });
        }

        let frame_length = PREFIX_LENGTH + length;
        if buf.len() < frame_length {
            buf.reserve(frame_length - buf.len());
            return Ok(None);
        }

        buf.advance(PREFIX_LENGTH);
        Ok(Some(buf.split_to(length).freeze()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(FrameError::Truncated {
                buffered: buf.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, buf: &mut BytesMut) -> Result<(), Self::Error> {
        if payload.len() > self.max_length {
            return Err(FrameError::FrameTooLarge {
                length: payload.len(),
                max: self.max_length,
            });
        }
        let prefix = length_prefix(payload.len())?;
        buf.reserve(PREFIX_LENGTH + payload.len());
        buf.put_u32(prefix);
        buf.extend_from_slice(&payload);
        Ok(())
    }
}

/// The prefix for a payload of `length` bytes, if the prefix can express it.
fn length_prefix(length: usize) -> Result<u32, FrameError> {
    u32::try_from(length).map_err(|_| FrameError::FrameTooLarge {
        length,
        max: u32::MAX as usize,
    })
}

/// Encode a single payload as a standalone frame, without any length limit
/// beyond what the prefix can express.
pub fn encode_frame(payload: impl AsRef<[u8]>) -> Result<Bytes, FrameError> {
    let payload = payload.as_ref();
    let prefix = length_prefix(payload.len())?;
    let mut buf = BytesMut::with_capacity(PREFIX_LENGTH + payload.len());
    buf.put_u32(prefix);
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}
