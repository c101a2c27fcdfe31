// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator service (ds-coordinator)
//!
//! Holds transaction lock leases and relays change notifications between
//! writers and readers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ds_coordinator::{server, MemoryCoordinator};
use ds_core::logging::init_logging;
use ds_core::Config;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Parser)]
#[command(name = "ds-coordinator", version, about = "Datastore lock and notification coordinator")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator service
    Serve {
        /// Address to bind, overrides `coordinator.listen`
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
            let listen = listen.unwrap_or(config.coordinator.listen);
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

            server::serve(
                listener,
                Arc::new(MemoryCoordinator::new()),
                config.coordinator.request_timeout,
                shutdown,
            )
            .await?;
        }
    }

    info!("coordinator stopped");
    Ok(())
}
