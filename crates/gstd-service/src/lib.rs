// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! gstd daemon: TCP transport and configuration around [`gstd_core::Daemon`].

pub mod config;
pub mod server;

pub use config::{ConfigError, ConfigService, ConfigStore, DaemonConfig, FsConfigStore};
pub use server::{handle_client, serve, ServerOptions};
