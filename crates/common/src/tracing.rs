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

//! Tracing initialization for the relay binary

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Crates whose events the relay reports at the requested level. Everything
/// else (tokio, mio, figment) stays at `warn`.
const RELAY_TARGETS: [&str; 2] = ["murmur_relay", "murmur_common"];

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    let mut directives = vec!["warn".to_string()];
    directives.extend(RELAY_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Initialize tracing, honouring `RUST_LOG` when set.
///
/// Session events carry their session id as a field, so thread names and
/// source locations are only shown in debug mode.
pub fn init_tracing(debug: bool) -> Result<(), eyre::Report> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter_directives(debug)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(debug)
                .with_file(debug)
                .with_line_number(debug)
                .with_thread_names(false),
        )
        .with(filter)
        .try_init()
        .map_err(|e| eyre::eyre!("Unable to install tracing subscriber: {e}"))?;

    Ok(())
}
