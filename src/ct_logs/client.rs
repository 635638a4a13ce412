// CT Log API Client
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Handles HTTP communication with CT log servers: the read-only get-sth and
// get-entries subset of RFC 6962.

use super::Result;
use crate::error::CertstreamError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of attempts for rate-limited or 5xx responses
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff duration (doubled with each retry)
const INITIAL_BACKOFF_MS: u64 = 100;

/// Maximum backoff duration
const MAX_BACKOFF_MS: u64 = 5000;

/// Read-only view of a CT log, as the watchers need it
#[async_trait]
pub trait LogApi: Send + Sync {
    /// Current `tree_size` from the log's signed tree head
    async fn get_tree_size(&self, log_url: &str) -> Result<u64>;

    /// Entries in the inclusive range `[start, end]`. The server may return
    /// fewer than requested, always starting at `start`.
    async fn get_entries(&self, log_url: &str, start: u64, end: u64) -> Result<Vec<RawLogEntry>>;
}

/// CT Log API Client
#[derive(Clone)]
pub struct CtClient {
    client: reqwest::Client,
    max_attempts: u32,
}

impl CtClient {
    /// Create a new CT Log API client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .user_agent(concat!("certstream/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Override how many times a 429/5xx response is attempted
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Retry a request with exponential backoff
    async fn retry_request(&self, url: &str) -> Result<reqwest::Response> {
        let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut last_status = None;

        for attempt in 0..self.max_attempts {
            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() != 429 && !status.is_server_error() {
                // Client error - don't retry
                return Err(CertstreamError::Http {
                    status: status.as_u16(),
                    details: format!("GET {} failed with status {}", url, status),
                });
            }

            last_status = Some(status);
            if attempt + 1 < self.max_attempts {
                warn!(
                    "Upstream returned {}, retrying after {:?} (attempt {}/{})",
                    status,
                    backoff,
                    attempt + 1,
                    self.max_attempts
                );
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, Duration::from_millis(MAX_BACKOFF_MS));
            }
        }

        let status = last_status.map(|s| s.as_u16()).unwrap_or_default();
        Err(CertstreamError::Http {
            status,
            details: format!("GET {} failed after {} attempts", url, self.max_attempts),
        })
    }
}

#[async_trait]
impl LogApi for CtClient {
    async fn get_tree_size(&self, log_url: &str) -> Result<u64> {
        let url = format!("{}/ct/v1/get-sth", log_url.trim_end_matches('/'));

        let response = self.retry_request(&url).await?;
        let sth: SignedTreeHead = response.json().await.map_err(|e| {
            CertstreamError::UnexpectedResponse {
                details: format!("Failed to parse STH response from {}: {}", log_url, e),
            }
        })?;

        Ok(sth.tree_size)
    }

    async fn get_entries(&self, log_url: &str, start: u64, end: u64) -> Result<Vec<RawLogEntry>> {
        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            log_url.trim_end_matches('/'),
            start,
            end
        );

        debug!("Fetching entries {}..={} from {}", start, end, log_url);

        let response = self.retry_request(&url).await?;
        let body: EntriesResponse = response.json().await.map_err(|e| {
            CertstreamError::UnexpectedResponse {
                details: format!("Failed to parse entries response from {}: {}", log_url, e),
            }
        })?;

        if let Some(message) = body.error_message {
            return Err(CertstreamError::UnexpectedResponse { details: message });
        }

        Ok(body.entries)
    }
}

/// Signed Tree Head response; only the size is consumed
#[derive(Debug, Deserialize, Serialize)]
struct SignedTreeHead {
    tree_size: u64,
    #[serde(default)]
    timestamp: u64,
    #[serde(default)]
    sha256_root_hash: String,
}

/// Get-entries API response
#[derive(Debug, Deserialize, Serialize)]
struct EntriesResponse {
    #[serde(default)]
    entries: Vec<RawLogEntry>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Individual CT log entry from the API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawLogEntry {
    pub leaf_input: String,
    pub extra_data: String,
}
