// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reader service (ds-reader)
//!
//! Serves queries from the shared log store, following the coordinator's
//! notifications to keep its known position current.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ds_coordinator::RemoteCoordinator;
use ds_core::logging::init_logging;
use ds_core::Config;
use ds_reader::{server, Reader, ReaderOptions};
use ds_storage::FileLogStore;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Parser)]
#[command(name = "ds-reader", version, about = "Datastore read service")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reader service
    Serve {
        /// Address to bind, overrides `reader.listen`
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = init_logging(&config.logging)?;

    match cli.command {
        Command::Serve { listen } => {
            let store = FileLogStore::open(&config.log_store.path).with_context(|| {
                format!("opening log store at {}", config.log_store.path.display())
            })?;
            let options = ReaderOptions::from_config(&config);
            let reader = Reader::new(Arc::new(store), options.clone());
            let known = reader.catch_up().await?;
            info!(known, cache_mode = ?options.cache_mode, "reader caught up");

            let coordinator = RemoteCoordinator::new(
                config.coordinator.addr.clone(),
                config.coordinator.request_timeout,
            );
            let follower = reader.follow(Arc::new(coordinator));

            let listen = listen.unwrap_or(config.reader.listen);
            let listener = TcpListener::bind(&listen)
                .await
                .with_context(|| format!("binding {}", listen))?;
            let mut sigterm = signal(SignalKind::terminate())?;
            let shutdown = async move {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                }
            };

            // Requests may wait for lagging positions before answering.
            let timeout = options.wait_timeout + ds_core::protocol::DEFAULT_TIMEOUT;
            server::serve(listener, reader, timeout, shutdown).await?;
            follower.abort();
            info!("reader stopped");
        }
    }

    Ok(())
}
