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

//! The shared table of live sessions.
//!
//! This is the only state shared between sessions. All access goes through a
//! single mutex, and callers only ever see point-in-time snapshots.

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The registry's record of one active session.
///
/// Cloning a handle shares the same outbound queue and drop token.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub display_name: Arc<str>,
    /// Rendered payloads waiting for this session's writer.
    pub(crate) outbound: mpsc::Sender<Bytes>,
    /// Cancelled to force the session's reader and writer to wind down.
    pub(crate) drop_token: CancellationToken,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        display_name: impl Into<Arc<str>>,
        outbound: mpsc::Sender<Bytes>,
        drop_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            outbound,
            drop_token,
        }
    }

    /// Ask the session's handler to close it.
    pub fn request_drop(&self) {
        self.drop_token.cancel();
    }

    pub fn is_drop_requested(&self) -> bool {
        self.drop_token.is_cancelled()
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<IndexMap<SessionId, SessionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active session, returning the population afterwards.
    pub fn add(&self, handle: SessionHandle) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(handle.id, handle);
        inner.len()
    }

    /// Remove a session. Only the first caller for a given id gets the handle
    /// back; any later call is a no-op returning `None`.
    pub fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        let mut inner = self.inner.lock().unwrap();
        inner.shift_remove(&id)
    }

    /// Point-in-time copy of all active sessions, in join order.
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        let inner = self.inner.lock().unwrap();
        inner.values().cloned().collect()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.inner.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.values().map(|h| h.display_name.to_string()).collect()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("population", &self.len())
            .finish()
    }
}
