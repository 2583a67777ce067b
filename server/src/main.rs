//! Standalone sync node.
//!
//! Runs the synchronization layer against the in-memory user directory and
//! channel registry, which is enough to smoke-test a broker deployment:
//! point two of these at the same broker and state changes flow between
//! them. A real game server embeds `partyline-runtime` with its own
//! directory, registry, and notifier implementations instead. The relay
//! transport needs a host-owned proxy link and is therefore not available
//! from this binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use partyline_config::load as load_config;
use partyline_runtime::{shutdown_signal, telemetry, SyncServices};
use partyline_users::{LogNotifier, MemoryChannelRegistry, MemoryUserDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing()?;

    info!("starting Partyline sync node");

    let config = load_config().context("failed to load configuration")?;

    let directory = Arc::new(MemoryUserDirectory::new());
    let channels = Arc::new(MemoryChannelRegistry::new());
    let notifier = Arc::new(LogNotifier);

    let services = SyncServices::initialise(&config, directory, channels, notifier, None)
        .await
        .context("failed to initialise the sync node")?;

    shutdown_signal().await;

    services.shutdown().await;
    info!("Partyline sync node stopped");

    Ok(())
}
