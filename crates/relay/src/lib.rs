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

//! A chat relay: clients connect over TCP, name themselves, and every line they
//! send is fanned out to every connected session.

pub mod args;
pub mod broadcast;
pub mod error;
pub mod listen;
pub mod registry;
pub mod relay;
pub mod session;

pub use args::{Args, SessionSettings};
pub use broadcast::{Broadcaster, PublishReport};
pub use error::SessionError;
pub use listen::Listener;
pub use registry::{ConnectionRegistry, SessionHandle, SessionId};
pub use relay::Relay;
pub use session::SessionState;
