// Per-Log Watcher
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// One task per upstream log: poll the head, fetch any growth in bounded
// ordered chunks, decode, publish, then advance the marker. The marker only
// moves after the whole range is enqueued, so a failed cycle is retried in
// full on the next one.

use super::client::LogApi;
use super::parser::Parser;
use super::sources::LogDescriptor;
use super::stats::StatsTracker;
use super::Result;
use crate::error::CertstreamError;
use crate::stream::bus::EventPublisher;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Largest range requested from a log in one get-entries call
pub const MAX_BLOCK_SIZE: u64 = 64;

/// Upper bound accepted for a configured block size
pub const BLOCK_SIZE_LIMIT: u64 = 1024;

/// Default sleep between cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default sleep after a failed cycle
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Where a watcher's marker starts on its first successful poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// Watch forward from the current head, no backfill
    #[default]
    Head,
    /// Start N entries behind the head, for immediate activity
    BehindHead(u64),
}

impl StartPosition {
    fn seed(self, tree_size: u64) -> u64 {
        match self {
            StartPosition::Head => tree_size,
            StartPosition::BehindHead(n) => tree_size.saturating_sub(n),
        }
    }
}

/// Watcher timing and sizing
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub block_size: u64,
    pub start: StartPosition,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            block_size: MAX_BLOCK_SIZE,
            start: StartPosition::Head,
        }
    }
}

/// Progress of one log. Owned by its watcher task, never shared.
#[derive(Debug, Clone)]
pub struct WatcherState {
    pub descriptor: LogDescriptor,
    last_tree_size: Option<u64>,
    consecutive_errors: u32,
}

impl WatcherState {
    pub fn new(descriptor: LogDescriptor) -> Self {
        Self {
            descriptor,
            last_tree_size: None,
            consecutive_errors: 0,
        }
    }

    /// `None` until the first successful head poll
    pub fn last_tree_size(&self) -> Option<u64> {
        self.last_tree_size
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Feed a polled `tree_size`; returns the half-open range to fetch, if any.
    ///
    /// The first observation seeds the marker according to `start`. A
    /// shrinking tree is reported and ignored.
    pub fn observe_tree_size(&mut self, tree_size: u64, start: StartPosition) -> Option<Range<u64>> {
        let last = match self.last_tree_size {
            Some(last) => last,
            None => {
                let seed = start.seed(tree_size);
                info!(
                    "[{}] Seeding marker at {} (tree size {})",
                    self.descriptor.description, seed, tree_size
                );
                self.last_tree_size = Some(seed);
                seed
            }
        };

        if tree_size > last {
            Some(last..tree_size)
        } else {
            if tree_size < last {
                warn!(
                    "[{}] Tree size went backwards ({} < {}), ignoring",
                    self.descriptor.description, tree_size, last
                );
            }
            None
        }
    }

    /// Move the marker forward after a fully published range
    pub fn advance(&mut self, tree_size: u64) {
        let next = self.last_tree_size.map_or(tree_size, |last| last.max(tree_size));
        self.last_tree_size = Some(next);
    }

    /// Count a failed cycle
    pub fn record_error(&mut self) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
    }

    /// End a failure streak after a successful cycle; returns its length
    pub fn clear_errors(&mut self) -> u32 {
        std::mem::take(&mut self.consecutive_errors)
    }
}

/// Split `[start, size - 1]` into inclusive chunks of at most `block` entries
pub fn plan_chunks(start: u64, size: u64, block: u64) -> Vec<(u64, u64)> {
    let block = block.max(1);
    let mut chunks = Vec::new();
    let mut chunk_start = start;

    while chunk_start < size {
        let chunk_end = chunk_start.saturating_add(block - 1).min(size - 1);
        debug_assert!(chunk_end >= chunk_start && chunk_end < size);
        chunks.push((chunk_start, chunk_end));
        chunk_start = chunk_end + 1;
    }

    chunks
}

/// Run `fut` unless the token fires first
async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CertstreamError::Cancelled),
        out = fut => out,
    }
}

/// Sleep for `duration`; false if the token fired first
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Watcher for a single log
pub struct PerLogWatcher {
    api: Arc<dyn LogApi>,
    parser: Parser,
    state: WatcherState,
    settings: WatcherSettings,
    publisher: EventPublisher,
    stats: StatsTracker,
}

impl PerLogWatcher {
    pub fn new(
        descriptor: LogDescriptor,
        api: Arc<dyn LogApi>,
        settings: WatcherSettings,
        publisher: EventPublisher,
        stats: StatsTracker,
    ) -> Self {
        stats.register_log(&descriptor.url, &descriptor.description);

        let block_size = settings.block_size.clamp(1, BLOCK_SIZE_LIMIT);
        Self {
            api,
            parser: Parser::new(&descriptor),
            state: WatcherState::new(descriptor),
            settings: WatcherSettings {
                block_size,
                ..settings
            },
            publisher,
            stats,
        }
    }

    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.state.descriptor.description
    }

    fn url(&self) -> &str {
        &self.state.descriptor.url
    }

    /// GET the head and return `tree_size`
    pub async fn poll_head(&self, cancel: &CancellationToken) -> Result<u64> {
        let tree_size = until_cancelled(cancel, self.api.get_tree_size(self.url())).await?;
        self.stats.record_tree_size(self.url(), tree_size);
        Ok(tree_size)
    }

    /// Fetch, decode and publish `[start, size)` chunk by chunk, in order.
    ///
    /// Entries that fail to decode are skipped. Any fetch or publish failure
    /// aborts the range. Returns the number of events published.
    pub async fn fetch_range(&self, start: u64, size: u64, cancel: &CancellationToken) -> Result<u64> {
        let mut published = 0;

        for (chunk_start, chunk_end) in plan_chunks(start, size, self.settings.block_size) {
            let mut next = chunk_start;

            // Servers may cap responses below the requested span
            while next <= chunk_end {
                let entries =
                    until_cancelled(cancel, self.api.get_entries(self.url(), next, chunk_end)).await?;

                if entries.is_empty() {
                    return Err(CertstreamError::UnexpectedResponse {
                        details: format!(
                            "empty get-entries response for {}..={} from {}",
                            next,
                            chunk_end,
                            self.url()
                        ),
                    });
                }

                let wanted = (chunk_end - next + 1) as usize;
                if entries.len() < wanted {
                    debug!(
                        "[{}] Short read: {} of {} entries at {}",
                        self.name(),
                        entries.len(),
                        wanted,
                        next
                    );
                }

                let taken = entries.len().min(wanted);
                if self.publisher.available() < taken {
                    debug!(
                        "[{}] Event bus nearly full ({} slots for {} entries)",
                        self.name(),
                        self.publisher.available(),
                        taken
                    );
                }
                for (offset, entry) in entries.iter().take(taken).enumerate() {
                    let index = next + offset as u64;
                    match self.parser.parse_entry(entry, index) {
                        Ok(event) => {
                            self.publisher.publish(event, cancel).await?;
                            self.stats.record_published(self.url(), 1);
                            published += 1;
                        }
                        Err(e) => {
                            warn!("[{}] Skipping entry {}: {}", self.name(), index, e);
                            self.stats.record_decode_failure(self.url());
                        }
                    }
                }

                next += taken as u64;
            }
        }

        Ok(published)
    }

    /// One POLL_HEAD → FETCH_RANGE → ADVANCE_MARKER cycle
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<()> {
        let tree_size = self.poll_head(cancel).await?;

        match self.state.observe_tree_size(tree_size, self.settings.start) {
            Some(range) => {
                info!(
                    "[{}] {} new entries ({}..{})",
                    self.name(),
                    range.end - range.start,
                    range.start,
                    range.end
                );
                let published = self.fetch_range(range.start, range.end, cancel).await?;
                self.state.advance(range.end);
                debug!("[{}] Published {} events, marker at {}", self.name(), published, range.end);
            }
            None => {
                debug!("[{}] No growth (tree size {})", self.name(), tree_size);
            }
        }

        if let Some(marker) = self.state.last_tree_size() {
            self.stats.record_marker(self.url(), marker);
        }

        let streak = self.state.clear_errors();
        if streak > 0 {
            info!("[{}] Recovered after {} failed cycles", self.name(), streak);
        }

        Ok(())
    }

    /// Run one cycle and return the pause before the next, or `None` to stop
    pub async fn cycle(&mut self, cancel: &CancellationToken) -> Option<Duration> {
        match self.poll_once(cancel).await {
            Ok(()) => Some(self.settings.poll_interval),
            Err(CertstreamError::Cancelled) => None,
            Err(CertstreamError::BusClosed) => {
                warn!("[{}] Event bus closed, stopping", self.name());
                None
            }
            Err(e) => {
                self.state.record_error();
                let streak = self.state.consecutive_errors();
                self.stats.record_fetch_failure(self.url(), streak);
                if e.is_retryable() {
                    warn!(
                        "[{}] Cycle failed ({} in a row), backing off {:?}: {}",
                        self.name(),
                        streak,
                        self.settings.error_backoff,
                        e
                    );
                } else {
                    error!(
                        "[{}] Cycle failed ({} in a row), backing off {:?}: {}",
                        self.name(),
                        streak,
                        self.settings.error_backoff,
                        e
                    );
                }
                Some(self.settings.error_backoff)
            }
        }
    }

    /// Poll until cancelled. Failures stay local to this log.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("[{}] Watching {}", self.name(), self.url());

        while !cancel.is_cancelled() {
            let Some(pause) = self.cycle(&cancel).await else {
                break;
            };
            if !sleep_or_cancel(pause, &cancel).await {
                break;
            }
        }

        info!("[{}] Watcher stopped", self.name());
    }
}
