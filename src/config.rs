// Configuration
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// TOML-backed runtime configuration. Every key has a default, so an empty
// file (or no file) yields a working server.

use crate::ct_logs::sources::{default_denylist, DEFAULT_REGISTRY_URL};
use crate::ct_logs::watcher::{StartPosition, WatcherSettings, BLOCK_SIZE_LIMIT, MAX_BLOCK_SIZE};
use crate::error::CertstreamError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Paths served by the query endpoints; the stats path may not shadow them
const RESERVED_PATHS: &[&str] = &["latest.json", "example.json", "health"];

/// Full runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub watcher: WatcherConfig,
    pub stream: StreamConfig,
    pub registry: RegistryConfig,
}

/// HTTP/websocket listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Path of the connection statistics endpoint, without leading slash
    pub stats_path: String,

    /// Permissive CORS on the query endpoints
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            stats_path: "stats".to_string(),
            enable_cors: true,
        }
    }
}

/// Per-log watcher behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Sleep after every cycle
    pub poll_interval_secs: u64,

    /// Sleep after a failed cycle
    pub error_backoff_secs: u64,

    /// Entries per get-entries request
    pub block_size: u64,

    /// Per-request transport timeout
    pub request_timeout_secs: u64,

    /// Attempts per request on 429/5xx
    pub max_attempts: u32,

    /// Marker seed on first poll
    pub start: StartPosition,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            error_backoff_secs: 5,
            block_size: MAX_BLOCK_SIZE,
            request_timeout_secs: 30,
            max_attempts: 3,
            start: StartPosition::Head,
        }
    }
}

impl WatcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Settings handed to each watcher
    pub fn settings(&self) -> WatcherSettings {
        WatcherSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            block_size: self.block_size.clamp(1, BLOCK_SIZE_LIMIT),
            start: self.start,
        }
    }
}

/// Event bus and subscriber side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub bus_capacity: usize,
    pub history_capacity: usize,
    pub subscriber_queue_capacity: usize,
    pub heartbeat_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bus_capacity: 5000,
            history_capacity: 25,
            subscriber_queue_capacity: 512,
            heartbeat_interval_secs: 10,
        }
    }
}

impl StreamConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Log registry source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry document URL
    pub url: String,

    /// Logs never watched, matched without scheme
    pub denylist: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            denylist: default_denylist(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Write the default configuration as an example file
    pub fn create_example(path: impl AsRef<Path>) -> Result<()> {
        let toml = toml::to_string_pretty(&Self::default())?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Normalize and check values that would otherwise fail at runtime
    pub fn validate(&mut self) -> Result<()> {
        self.server.stats_path = self.server.stats_path.trim().trim_matches('/').to_string();

        if self.server.stats_path.is_empty() {
            return Err(CertstreamError::Config {
                message: "server.stats_path must not be empty".to_string(),
            });
        }

        if RESERVED_PATHS.contains(&self.server.stats_path.as_str()) {
            return Err(CertstreamError::Config {
                message: format!(
                    "server.stats_path '{}' collides with a built-in endpoint",
                    self.server.stats_path
                ),
            });
        }

        if self.watcher.block_size == 0 || self.watcher.block_size > BLOCK_SIZE_LIMIT {
            return Err(CertstreamError::Config {
                message: format!(
                    "watcher.block_size must be between 1 and {}",
                    BLOCK_SIZE_LIMIT
                ),
            });
        }

        if self.watcher.poll_interval_secs == 0 {
            return Err(CertstreamError::Config {
                message: "watcher.poll_interval_secs must be positive".to_string(),
            });
        }

        if self.stream.heartbeat_interval_secs == 0 {
            return Err(CertstreamError::Config {
                message: "stream.heartbeat_interval_secs must be positive".to_string(),
            });
        }

        if self.registry.url.trim().is_empty() {
            return Err(CertstreamError::Config {
                message: "registry.url must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
