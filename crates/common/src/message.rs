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

use std::fmt;

/// Prefixes a join notice.
pub const JOIN_MARK: &str = "🔵";
/// Prefixes a leave notice.
pub const LEAVE_MARK: &str = "🔴";

#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Join,
    Leave,
    Chat,
}

/// A single relay event, rendered to text when it goes out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub sender: String,
    pub body: String,
}

impl ChatMessage {
    pub fn join(name: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Join,
            sender: name.into(),
            body: String::new(),
        }
    }

    pub fn leave(name: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Leave,
            sender: name.into(),
            body: String::new(),
        }
    }

    pub fn chat(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Chat,
            sender: name.into(),
            body: body.into(),
        }
    }

    pub fn render(&self) -> String {
        match self.kind {
            MessageKind::Join => format!("{JOIN_MARK} {} has joined the chat!", self.sender),
            MessageKind::Leave => format!("{LEAVE_MARK} {} has left the chat.", self.sender),
            MessageKind::Chat => format!("[{}] {}", self.sender, self.body),
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
