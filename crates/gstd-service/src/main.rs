// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! gstd: pipeline control daemon over TCP.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gstd_core::engine::sim::SimEngine;
use gstd_core::Daemon;
use gstd_service::{serve, ConfigService, DaemonConfig, FsConfigStore, ServerOptions};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "gstd pipeline control daemon")]
struct Args {
    /// Address to bind (overrides the config file)
    #[arg(long)]
    address: Option<String>,
    /// TCP port to bind (overrides the config file)
    #[arg(long, short)]
    port: Option<u16>,
    /// Close each connection after its first response
    #[arg(long)]
    close_after_response: bool,
    /// Longest accepted command line in bytes
    #[arg(long)]
    max_line_bytes: Option<usize>,
    /// Default tracing filter (RUST_LOG still wins)
    #[arg(long)]
    log_filter: Option<String>,
    /// Directory holding daemon.json instead of the platform config dir
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Streaming tick of the simulated engine, in milliseconds
    #[arg(long, default_value_t = 33)]
    tick_ms: u64,
}

impl Args {
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(address) = &self.address {
            config.address.clone_from(address);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.close_after_response {
            config.keep_connection_open = false;
        }
        if let Some(max) = self.max_line_bytes {
            config.max_line_bytes = max;
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter.clone_from(filter);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config (best-effort)
    let store = match &args.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    };
    let (mut config, config_err) = match store {
        Ok(store) => DaemonConfig::load_or_default(&ConfigService::new(store)),
        Err(err) => (DaemonConfig::default(), Some(err)),
    };
    args.apply(&mut config);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Some(err) = config_err {
        warn!(%err, "config unavailable, using defaults");
    }

    let engine = Arc::new(SimEngine::with_tick(Duration::from_millis(args.tick_ms.max(1))));
    let daemon = Arc::new(Daemon::new(engine));
    let options = ServerOptions {
        keep_connection_open: config.keep_connection_open,
        max_line_bytes: config.max_line_bytes,
    };

    let bind = config.bind_addr();
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;

    tokio::select! {
        res = serve(listener, Arc::clone(&daemon), options) => res?,
        res = tokio::signal::ctrl_c() => {
            res.context("install ctrl-c handler")?;
            info!("shutting down");
        }
    }

    tokio::task::spawn_blocking(move || daemon.shutdown()).await?;
    Ok(())
}
