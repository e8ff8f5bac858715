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

use clap::Parser;
use eyre::eyre;
use murmur_relay::{Args, Listener, Relay};
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;
    let args = Args::parse().resolve()?;

    murmur_common::tracing::init_tracing(args.debug)?;

    let settings = args.session_settings()?;
    let listen_addr = args
        .listen_address
        .parse::<SocketAddr>()
        .map_err(|e| eyre!("Unable to parse listen address {}: {e}", args.listen_address))?;

    let mut hup_signal = signal(SignalKind::hangup())?;
    let mut stop_signal = signal(SignalKind::interrupt())?;

    // Bind failure is the relay's only fatal error.
    let listener = Listener::bind(listen_addr, Relay::new(settings))
        .await
        .map_err(|e| eyre!("Unable to bind listener on {listen_addr}: {e}"))?;
    info!(
        max_frame_length = settings.max_frame_length,
        outbound_queue_depth = settings.outbound_queue_depth,
        idle_timeout = ?settings.idle_timeout,
        "Relay started, listening @ {}...",
        listener.local_addr()
    );

    let (terminate_send, terminate_receive) = tokio::sync::watch::channel(false);
    let mut listen_loop = tokio::spawn(listener.run(terminate_receive));

    select! {
        _ = &mut listen_loop => {
            info!("Listener exited, stopping...");
        }
        _ = hup_signal.recv() => {
            info!("HUP received, stopping...");
        },
        _ = stop_signal.recv() => {
            info!("STOP received, stopping...");
        }
    }
    let _ = terminate_send.send(true);
    info!("Done.");

    Ok(())
}
