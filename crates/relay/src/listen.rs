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

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::relay::Relay;

/// Pause after a failed accept, so a persistent error (e.g. fd exhaustion)
/// doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    relay: Relay,
}

impl Listener {
    pub async fn bind(addr: SocketAddr, relay: Relay) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening @ {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            relay,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Accept connections until `terminate` flips (or its sender goes away).
    /// Each connection gets its own session task; nothing here waits on one.
    pub async fn run(self, mut terminate: watch::Receiver<bool>) {
        loop {
            select! {
                _ = terminate.changed() => {
                    info!("Listener terminated, stopping...");
                    break;
                }
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            info!(?peer_addr, "Accepted connection");
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!(?peer_addr, ?e, "Unable to set TCP_NODELAY");
                            }
                            self.relay.spawn_session(stream, peer_addr.to_string());
                        }
                        Err(e) => {
                            warn!(?e, "Accept failed, can't handle connection");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }
}
