// CLI module - Command line interface and argument parsing
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

mod ct_logs_args;
mod server_args;

pub use ct_logs_args::CtLogsArgs;
pub use server_args::ServerArgs;

/// certstream - real-time Certificate Transparency firehose
///
/// Watches every log in the registry, decodes new entries and streams them
/// as JSON to websocket clients.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(name = "certstream")]
pub struct Args {
    /// Configuration file (TOML format)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write an example configuration file and exit
    #[arg(long = "config-example", value_name = "FILE")]
    pub config_example: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    // ============ Websocket Server ============
    #[command(flatten)]
    pub server: ServerArgs,

    // ============ Certificate Transparency Logs ============
    #[command(flatten)]
    pub ct_logs: CtLogsArgs,
}

impl Args {
    /// Load the configuration file (if any), then apply CLI overrides
    pub fn load_config(&self) -> crate::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        self.server.apply(&mut config);
        self.ct_logs.apply(&mut config);
        config.validate()?;

        Ok(config)
    }
}
