// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer service (ds-writer)
//!
//! Serves write transactions against the shared log store, or seeds an
//! empty store from a snapshot through a running writer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ds_coordinator::RemoteCoordinator;
use ds_core::logging::init_logging;
use ds_core::protocol::DEFAULT_TIMEOUT;
use ds_core::Config;
use ds_storage::FileLogStore;
use ds_writer::{bootstrap, server, SnapshotSource, Writer, WriterClient, WriterOptions};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Parser)]
#[command(name = "ds-writer", version, about = "Datastore write service")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the writer service
    Serve {
        /// Address to bind, overrides `writer.listen`
        #[arg(long)]
        listen: Option<String>,
    },
    /// Seed the datastore from a JSON snapshot
    Bootstrap {
        /// Snapshot file path or http(s) URL
        #[arg(long)]
        source: String,
        /// Writer to submit to, defaults to `writer.listen`
        #[arg(long)]
        writer: Option<String>,
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
            let coordinator = RemoteCoordinator::new(
                config.coordinator.addr.clone(),
                config.coordinator.request_timeout,
            );
            let writer = Writer::new(
                Arc::new(store),
                Arc::new(coordinator),
                WriterOptions::from_config(&config),
            );
            if config.writer.dev_mode {
                info!("dev mode enabled");
            }

            let listen = listen.unwrap_or(config.writer.listen);
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

            server::serve(listener, writer, DEFAULT_TIMEOUT, shutdown).await?;
            info!("writer stopped");
        }
        Command::Bootstrap { source, writer } => {
            let addr = writer.unwrap_or(config.writer.listen);
            // Covers the fetch-free part: lock wait plus commit plus slack.
            let timeout = config.writer.lock_acquire_timeout
                + config.writer.commit_timeout
                + DEFAULT_TIMEOUT;
            let client = WriterClient::new(addr, timeout);
            let source = SnapshotSource::parse(&source);
            let position = bootstrap(&client, &source)
                .await
                .with_context(|| format!("bootstrapping from {}", source))?;
            println!("bootstrapped at position {}", position);
        }
    }

    Ok(())
}
