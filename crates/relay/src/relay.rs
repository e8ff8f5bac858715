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

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::args::SessionSettings;
use crate::broadcast::Broadcaster;
use crate::error::SessionError;
use crate::registry::ConnectionRegistry;
use crate::session;

/// Shared relay state handed to every session: the registry (via the
/// broadcaster) and the per-session limits.
#[derive(Clone, Debug)]
pub struct Relay {
    broadcaster: Broadcaster,
    settings: SessionSettings,
}

impl Relay {
    pub fn new(settings: SessionSettings) -> Self {
        let registry = ConnectionRegistry::new();
        Self {
            broadcaster: Broadcaster::new(registry, settings.max_frame_length),
            settings,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.broadcaster.registry()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Spawn a session handler for an accepted stream. The handler's outcome
    /// is logged here and never escapes the task.
    pub fn spawn_session<S>(
        &self,
        stream: S,
        peer: impl Into<String>,
    ) -> JoinHandle<Result<(), SessionError>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let relay = self.clone();
        let peer = peer.into();
        tokio::spawn(async move {
            let result = session::run_session(relay, stream, peer.clone()).await;
            match &result {
                Ok(()) => debug!(peer = %peer, "Session closed"),
                Err(SessionError::HandshakeFailed(reason)) => {
                    info!(peer = %peer, reason = %reason, "Handshake failed, closing connection")
                }
                Err(e) => warn!(peer = %peer, error = %e, "Session closed with error"),
            }
            result
        })
    }
}
