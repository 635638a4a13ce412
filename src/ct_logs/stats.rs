// CT Logs Statistics Tracker
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Per-log ingest counters written by the watchers and read by /health

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Statistics for CT log ingestion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Events handed to the event bus, all logs
    pub total_published: u64,
    /// Entries skipped because they failed to decode
    pub total_decode_failures: u64,
    /// Failed head polls or range fetches
    pub total_fetch_failures: u64,
    /// Per-log statistics keyed by log URL
    pub per_log: BTreeMap<String, LogStats>,
    /// Start time
    #[serde(skip)]
    pub start_time: Option<Instant>,
    /// Seconds since the tracker was created
    pub uptime_secs: u64,
}

/// Per-log statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStats {
    pub description: String,
    /// Last tree size reported by the log
    pub tree_size: u64,
    /// Watcher marker; entries below it have been published
    pub marker: Option<u64>,
    pub published: u64,
    pub decode_failures: u64,
    pub fetch_failures: u64,
    /// Failures since the last successful cycle
    pub consecutive_errors: u32,
}

/// Thread-safe statistics tracker
#[derive(Clone)]
pub struct StatsTracker {
    stats: Arc<Mutex<Stats>>,
}

impl StatsTracker {
    /// Create a new statistics tracker
    pub fn new() -> Self {
        let stats = Stats {
            start_time: Some(Instant::now()),
            ..Default::default()
        };

        Self {
            stats: Arc::new(Mutex::new(stats)),
        }
    }

    fn with_log<F>(&self, url: &str, description: &str, f: F)
    where
        F: FnOnce(&mut Stats, &str),
    {
        if let Ok(mut stats) = self.stats.lock() {
            stats
                .per_log
                .entry(url.to_string())
                .or_insert_with(|| LogStats {
                    description: description.to_string(),
                    ..Default::default()
                });
            f(&mut *stats, url);
        }
    }

    /// Register a log before its first poll so it shows up in snapshots
    pub fn register_log(&self, url: &str, description: &str) {
        self.with_log(url, description, |_, _| {});
    }

    /// Record a successful head poll
    pub fn record_tree_size(&self, url: &str, tree_size: u64) {
        self.with_log(url, "", |stats, url| {
            if let Some(log) = stats.per_log.get_mut(url) {
                log.tree_size = tree_size;
            }
        });
    }

    /// Record a marker advance, which also ends an error streak
    pub fn record_marker(&self, url: &str, marker: u64) {
        self.with_log(url, "", |stats, url| {
            if let Some(log) = stats.per_log.get_mut(url) {
                log.marker = Some(marker);
                log.consecutive_errors = 0;
            }
        });
    }

    pub fn record_published(&self, url: &str, count: u64) {
        self.with_log(url, "", |stats, url| {
            stats.total_published += count;
            if let Some(log) = stats.per_log.get_mut(url) {
                log.published += count;
            }
        });
    }

    pub fn record_decode_failure(&self, url: &str) {
        self.with_log(url, "", |stats, url| {
            stats.total_decode_failures += 1;
            if let Some(log) = stats.per_log.get_mut(url) {
                log.decode_failures += 1;
            }
        });
    }

    pub fn record_fetch_failure(&self, url: &str, consecutive_errors: u32) {
        self.with_log(url, "", |stats, url| {
            stats.total_fetch_failures += 1;
            if let Some(log) = stats.per_log.get_mut(url) {
                log.fetch_failures += 1;
                log.consecutive_errors = consecutive_errors;
            }
        });
    }

    /// Get current statistics snapshot
    pub fn get_snapshot(&self) -> Stats {
        if let Ok(mut stats) = self.stats.lock() {
            if let Some(start_time) = stats.start_time {
                stats.uptime_secs = start_time.elapsed().as_secs();
            }

            stats.clone()
        } else {
            Stats::default()
        }
    }

    /// Published events per second since start
    pub fn get_publish_rate(&self) -> f64 {
        if let Ok(stats) = self.stats.lock()
            && let Some(start_time) = stats.start_time
        {
            let elapsed_secs = start_time.elapsed().as_secs_f64();
            if elapsed_secs > 0.0 {
                return stats.total_published as f64 / elapsed_secs;
            }
        }
        0.0
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}
