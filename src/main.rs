// certstream - real-time Certificate Transparency log aggregator
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

use anyhow::{Context, Result};
use certstream::supervisor::{wait_for_shutdown_signal, Supervisor};
use certstream::{Args, CertstreamError, Config};
use clap::Parser;
use colored::Colorize;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging - --log-level wins over RUST_LOG
    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Handle --config-example (generate config example and exit)
    if let Some(config_path) = &args.config_example {
        Config::create_example(config_path)?;
        println!(
            "{} Example configuration saved to: {}",
            "✓".green(),
            config_path.display()
        );
        return Ok(());
    }

    let config = args.load_config()?;
    info!(
        "Starting certstream v{} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port
    );

    let supervisor = Supervisor::new(config.clone())?;
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.server.host, config.server.port))?;

    // Translate OS signals into the shutdown token
    let shutdown = supervisor.shutdown_token();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    match supervisor.run(listener).await {
        Ok(()) => Ok(()),
        Err(e @ CertstreamError::Registry { .. }) => {
            error!("{}", e);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
