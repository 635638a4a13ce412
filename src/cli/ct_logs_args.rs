// Certificate Transparency log watching arguments
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::config::Config;
use crate::ct_logs::watcher::StartPosition;
use clap::Args;

/// Certificate Transparency log watching options
///
/// Every option overrides the matching key of the configuration file when
/// given; omitted options leave the file (or default) value in place.
#[derive(Args, Debug, Clone, Default)]
pub struct CtLogsArgs {
    /// Log registry URL (JSON list of {url, description})
    #[arg(long = "registry-url", value_name = "URL")]
    pub registry_url: Option<String>,

    /// Additional log URL to skip (repeatable, scheme optional)
    #[arg(long = "deny-log", value_name = "URL")]
    pub deny: Vec<String>,

    /// Seconds to sleep between polls of one log
    #[arg(long = "poll-interval", value_name = "SECONDS")]
    pub poll_interval: Option<u64>,

    /// Seconds to sleep after a failed poll
    #[arg(long = "error-backoff", value_name = "SECONDS")]
    pub error_backoff: Option<u64>,

    /// Entries per get-entries request (max 1024)
    #[arg(long = "block-size", value_name = "NUM")]
    pub block_size: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long = "request-timeout", value_name = "SECONDS")]
    pub request_timeout: Option<u64>,

    /// Start each log N entries behind its head instead of at the head
    #[arg(long = "behind-head", value_name = "N")]
    pub behind_head: Option<u64>,
}

impl CtLogsArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.registry_url {
            config.registry.url = url.clone();
        }
        config.registry.denylist.extend(self.deny.iter().cloned());
        if let Some(secs) = self.poll_interval {
            config.watcher.poll_interval_secs = secs;
        }
        if let Some(secs) = self.error_backoff {
            config.watcher.error_backoff_secs = secs;
        }
        if let Some(size) = self.block_size {
            config.watcher.block_size = size;
        }
        if let Some(secs) = self.request_timeout {
            config.watcher.request_timeout_secs = secs;
        }
        if let Some(n) = self.behind_head {
            config.watcher.start = StartPosition::BehindHead(n);
        }
    }
}
