// API State Management
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::ct_logs::stats::StatsTracker;
use crate::stream::history::RecentHistory;
use crate::stream::registry::SubscriberRegistry;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shared application state
pub struct AppState {
    /// Connected subscribers
    pub registry: SubscriberRegistry,

    /// Recent updates for the snapshot endpoints
    pub history: RecentHistory,

    /// Ingest statistics written by the watchers
    pub stats: StatsTracker,

    /// Process-wide shutdown signal
    pub shutdown: CancellationToken,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        registry: SubscriberRegistry,
        history: RecentHistory,
        stats: StatsTracker,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            history,
            stats,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
