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

use std::time::Duration;

use clap_derive::Parser;
use eyre::{bail, eyre};
use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
};
use murmur_common::DEFAULT_MAX_FRAME_LENGTH;
use serde_derive::{Deserialize, Serialize};

/// Default cap on pending outbound messages per session.
pub const DEFAULT_OUTBOUND_QUEUE_DEPTH: usize = 256;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "murmur-relay", about = "Chat relay server")]
pub struct Args {
    #[arg(
        long,
        value_name = "listen-address",
        help = "Relay listen address",
        default_value = "127.0.0.1:12345"
    )]
    pub listen_address: String,

    #[arg(
        long,
        value_name = "bytes",
        help = "Largest frame payload accepted from or sent to a client",
        default_value_t = DEFAULT_MAX_FRAME_LENGTH
    )]
    pub max_frame_length: usize,

    #[arg(
        long,
        value_name = "messages",
        help = "Pending outbound messages allowed per session before it is dropped",
        default_value_t = DEFAULT_OUTBOUND_QUEUE_DEPTH
    )]
    pub outbound_queue_depth: usize,

    #[arg(
        long,
        value_name = "seconds",
        help = "Close sessions which send nothing for this many seconds"
    )]
    pub idle_timeout: Option<u64>,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    pub debug: bool,

    #[arg(long, help = "Yaml config file to use, overrides values in CLI args")]
    pub config_file: Option<String>,
}

/// Per-session limits, fixed for the lifetime of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub max_frame_length: usize,
    pub outbound_queue_depth: usize,
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            outbound_queue_depth: DEFAULT_OUTBOUND_QUEUE_DEPTH,
            idle_timeout: None,
        }
    }
}

impl Args {
    /// Layer the yaml config file, if any, over the command line values.
    pub fn resolve(self) -> Result<Self, eyre::Report> {
        let Some(config_file) = self.config_file.clone() else {
            return Ok(self);
        };
        Figment::new()
            .merge(Serialized::defaults(self))
            .merge(Yaml::file(&config_file))
            .extract::<Args>()
            .map_err(|e| eyre!("Failed to parse configuration from {config_file:?}: {e}"))
    }

    pub fn session_settings(&self) -> Result<SessionSettings, eyre::Report> {
        if self.outbound_queue_depth == 0 {
            bail!("outbound_queue_depth must be at least 1");
        }
        if self.max_frame_length == 0 || self.max_frame_length > u32::MAX as usize {
            bail!(
                "max_frame_length must be between 1 and {} bytes",
                u32::MAX
            );
        }
        Ok(SessionSettings {
            max_frame_length: self.max_frame_length,
            outbound_queue_depth: self.outbound_queue_depth,
            idle_timeout: self
                .idle_timeout
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}
