//! mockhub-server/src/server.rs
//!
//! Builds the hub configuration from the command line and runs until Ctrl-C.

use std::time::Duration;
use anyhow::Context;
use tracing::info;

use mockhub_core::{HubConfig, MockHub, ShutdownMode, ShutdownOptions};

use crate::Args;

pub fn hub_config(args: &Args) -> HubConfig {
    HubConfig {
        hub_url: args
            .hub_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/hub", args.port)),
        listen_port: Some(args.port),
        database_url: args.database_url.clone(),
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        verbose: args.verbose,
        log_errors: args.log_errors,
        clear_on_start: !args.keep_db,
        ..HubConfig::default()
    }
}

pub async fn run_server(args: Args) -> anyhow::Result<()> {
    let config = hub_config(&args);
    let hub = MockHub::start(config.clone())
        .await
        .with_context(|| format!("failed to start hub with store {}", config.database_url))?;

    match hub.local_addr() {
        Some(addr) => info!("Hub listening on {} (route {})", addr, config.hub_url),
        None => info!("Hub started without a listener"),
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("Ctrl-C received; shutting down hub.");
    hub.shutdown(ShutdownOptions { mode: ShutdownMode::Graceful, close_store: true })
        .await;
    Ok(())
}
