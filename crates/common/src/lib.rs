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

pub use frame_codec::{DEFAULT_MAX_FRAME_LENGTH, FrameCodec, FrameError, encode_frame};
pub use message::{ChatMessage, JOIN_MARK, LEAVE_MARK, MessageKind};

pub mod frame_codec;
pub mod message;
pub mod tracing;
