// CT Log Sources Management
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Loads the registry of known CT logs once at startup and removes operators
// that are known to be unreachable or to serve invalid certificates.

use super::Result;
use crate::error::CertstreamError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Google CT log list URL (flat format, scheme-less log URLs)
pub const DEFAULT_REGISTRY_URL: &str = "https://www.gstatic.com/ct/log_list/log_list.json";

/// Operators never watched, in scheme-less form without trailing slash
pub const DEFAULT_DENYLIST: &[&str] = &[
    "ct.izenpe.com",
    "ct.izenpe.eus",
    "ctserver.cnnic.cn",
    "log.certly.io",
    "ctlog.wosign.com",
    "ct.wosign.com",
    "ct1.digicert-ct.com/log",
    "ct.ws.symantec.com",
    "vega.ws.symantec.com",
    "sirius.ws.symantec.com",
    "ct.gdca.com.cn",
    "ctlog.gdca.com.cn",
    "www.certificatetransparency.cn/ct",
    "ctlog-gen2.api.venafi.com",
];

/// One upstream log, immutable after load
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogDescriptor {
    /// Base URL, with scheme and without trailing slash
    pub url: String,
    /// Human-readable description
    pub description: String,
}

impl LogDescriptor {
    pub fn new(url: &str, description: impl Into<String>) -> Self {
        Self {
            url: normalize_url(url),
            description: description.into(),
        }
    }

    /// Host and path with scheme and trailing slash removed
    pub fn bare_url(&self) -> &str {
        strip_scheme(&self.url)
    }
}

/// Registry loader
pub struct LogRegistry {
    client: reqwest::Client,
    url: String,
}

impl LogRegistry {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the registry document.
    ///
    /// Every failure is reported as `CertstreamError::Registry`; the caller
    /// treats it as fatal.
    pub async fn fetch(&self) -> Result<Vec<LogDescriptor>> {
        info!("Fetching CT log registry from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CertstreamError::Registry {
                message: format!("Failed to fetch {}: {}", self.url, e),
            })?;

        if !response.status().is_success() {
            return Err(CertstreamError::Registry {
                message: format!(
                    "Registry request to {} failed with status: {}",
                    self.url,
                    response.status()
                ),
            });
        }

        let body = response.text().await.map_err(|e| CertstreamError::Registry {
            message: format!("Failed to read registry body: {}", e),
        })?;

        let logs = parse_registry(&body)?;
        info!("Loaded {} CT logs from registry", logs.len());
        Ok(logs)
    }
}

/// Parse either the flat `{"logs": [...]}` document or the v3
/// `{"operators": [{"logs": [...]}]}` document. Duplicate URLs are dropped.
pub fn parse_registry(body: &str) -> Result<Vec<LogDescriptor>> {
    let document: RegistryDocument =
        serde_json::from_str(body).map_err(|e| CertstreamError::Registry {
            message: format!("Failed to parse registry: {}", e),
        })?;

    let candidates: Vec<LogDescriptor> = match document {
        RegistryDocument::Flat { logs } => logs
            .into_iter()
            .map(|log| {
                let description = log.description.unwrap_or_else(|| log.url.clone());
                LogDescriptor::new(&log.url, description)
            })
            .collect(),
        RegistryDocument::Operators { operators } => operators
            .into_iter()
            .flat_map(|operator| {
                let name = operator.name;
                operator
                    .logs
                    .into_iter()
                    .filter(|log| !log.is_retired())
                    .map(move |log| {
                        let description = log
                            .description
                            .unwrap_or_else(|| format!("{} CT Log", name));
                        LogDescriptor::new(&log.url, description)
                    })
            })
            .collect(),
    };

    let mut seen = HashSet::new();
    Ok(candidates
        .into_iter()
        .filter(|log| seen.insert(log.url.clone()))
        .collect())
}

/// Remove every log whose scheme-less URL is on the denylist
pub fn filter_denylisted(logs: Vec<LogDescriptor>, denylist: &[String]) -> Vec<LogDescriptor> {
    let denied: HashSet<&str> = denylist
        .iter()
        .map(|entry| strip_scheme(entry.trim()))
        .collect();

    logs.into_iter()
        .filter(|log| {
            let keep = !denied.contains(log.bare_url());
            if !keep {
                debug!("[{}] Skipping denylisted log {}", log.description, log.url);
            }
            keep
        })
        .collect()
}

/// Built-in denylist as owned strings, for configuration defaults
pub fn default_denylist() -> Vec<String> {
    DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect()
}

/// Ensure a scheme and drop trailing slashes
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        if trimmed.contains("://") {
            warn!("Registry URL {} has an unsupported scheme", trimmed);
        }
        format!("https://{}", trimmed)
    }
}

fn strip_scheme(url: &str) -> &str {
    let without = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    without.trim_end_matches('/')
}

// Registry JSON structures
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegistryDocument {
    Operators { operators: Vec<Operator> },
    Flat { logs: Vec<RegistryLog> },
}

#[derive(Debug, Deserialize)]
struct Operator {
    #[serde(default)]
    name: String,
    #[serde(default)]
    logs: Vec<RegistryLog>,
}

#[derive(Debug, Deserialize)]
struct RegistryLog {
    url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    state: Option<HashMap<String, serde_json::Value>>,
}

impl RegistryLog {
    /// v3 logs in `retired` or `rejected` state no longer accept submissions
    fn is_retired(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.contains_key("retired") || state.contains_key("rejected"))
    }
}
