// Websocket server arguments
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::config::Config;
use clap::Args;

/// Listener options
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Bind address
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Bind port
    #[arg(long = "port", value_name = "PORT", env = "PORT")]
    pub port: Option<u16>,

    /// Path of the connection statistics endpoint
    #[arg(long = "stats-path", value_name = "PATH", env = "STATS_URL")]
    pub stats_path: Option<String>,

    /// Disable CORS headers on the query endpoints
    #[arg(long = "no-cors")]
    pub no_cors: bool,
}

impl ServerArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.stats_path {
            config.server.stats_path = path.clone();
        }
        if self.no_cors {
            config.server.enable_cors = false;
        }
    }
}
