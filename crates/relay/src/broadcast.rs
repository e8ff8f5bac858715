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

//! Fan-out of rendered messages to every registered session.
//!
//! Delivery never writes to a socket: each recipient gets the payload pushed
//! onto its bounded outbound queue, and that session's own writer task does
//! the I/O. A recipient whose queue is full or whose writer has gone away is
//! evicted and everyone else is told it left.

use std::collections::VecDeque;

use bytes::Bytes;
use murmur_common::ChatMessage;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::registry::{ConnectionRegistry, SessionHandle, SessionId};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Recipients that had the message queued.
    pub delivered: usize,
    /// Sessions evicted while publishing, including during follow-up leave notices.
    pub evicted: Vec<SessionId>,
    /// Set when the rendered message was too large to frame, and nothing was sent.
    pub oversized: bool,
}

#[derive(Clone, Debug)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
    max_payload: usize,
}

impl Broadcaster {
    pub fn new(registry: ConnectionRegistry, max_payload: usize) -> Self {
        Self {
            registry,
            max_payload,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Queue `message` for every session except `exclude`.
    ///
    /// Never blocks and never fails as a whole; per-recipient problems turn
    /// into evictions, each followed by exactly one leave notice.
    pub fn publish(&self, message: &ChatMessage, exclude: Option<SessionId>) -> PublishReport {
        let mut report = PublishReport::default();
        let rendered = message.render();
        if rendered.len() > self.max_payload {
            warn!(
                sender = %message.sender,
                length = rendered.len(),
                max = self.max_payload,
                "Message too large to relay, dropping it"
            );
            report.oversized = true;
            return report;
        }

        let mut pending = VecDeque::from([(Bytes::from(rendered), exclude, true)]);
        while let Some((payload, exclude, primary)) = pending.pop_front() {
            for recipient in self.registry.snapshot() {
                if Some(recipient.id) == exclude {
                    continue;
                }
                match recipient.outbound.try_send(payload.clone()) {
                    Ok(()) => {
                        trace!(recipient = %recipient.id, "Queued message");
                        if primary {
                            report.delivered += 1;
                        }
                    }
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            session = %recipient.id,
                            name = %recipient.display_name,
                            "Outbound queue full, dropping unresponsive session"
                        );
                        if let Some(evicted) = self.evict(recipient.id) {
                            report.evicted.push(evicted.id);
                            pending.push_back((leave_payload(&evicted), None, false));
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(
                            session = %recipient.id,
                            name = %recipient.display_name,
                            "Outbound queue closed, removing session"
                        );
                        if let Some(evicted) = self.evict(recipient.id) {
                            report.evicted.push(evicted.id);
                            pending.push_back((leave_payload(&evicted), None, false));
                        }
                    }
                }
            }
        }
        report
    }

    /// Remove a session and tell its handler to wind down. Returns the handle
    /// only if this call was the one that removed it.
    fn evict(&self, id: SessionId) -> Option<SessionHandle> {
        let handle = self.registry.remove(id)?;
        handle.request_drop();
        Some(handle)
    }
}

fn leave_payload(handle: &SessionHandle) -> Bytes {
    Bytes::from(ChatMessage::leave(&*handle.display_name).render())
}
