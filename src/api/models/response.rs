// API Response Models
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::ct_logs::stats::Stats;
use crate::stream::message::{Channel, StreamMessage};
use crate::stream::registry::SubscriberInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,

    /// Crate version
    pub version: String,

    /// Server uptime in seconds
    pub uptime_seconds: u64,

    /// Live websocket subscribers
    pub connected_clients: usize,

    /// Updates currently retained for the snapshot endpoints
    pub history_size: usize,

    /// Published events per second since start
    pub publish_rate: f64,

    /// Ingest counters, global and per log
    pub ingest: Stats,
}

/// Recent-history snapshot, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestResponse {
    pub messages: Vec<StreamMessage>,
}

/// One connected client as shown by the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientStats {
    pub id: Uuid,
    pub remote_address: String,
    pub connected_at: DateTime<Utc>,
    pub connection_age_seconds: i64,
    /// Human-readable age, `H:MM:SS`
    pub connection_age: String,
    pub channel: Channel,
}

impl ClientStats {
    pub fn from_info(info: SubscriberInfo, now: DateTime<Utc>) -> Self {
        let age = (now - info.connected_at).num_seconds().max(0);
        Self {
            id: info.id,
            remote_address: info.remote_address,
            connected_at: info.connected_at,
            connection_age_seconds: age,
            connection_age: format_age(age),
            channel: info.channel,
        }
    }
}

/// Connection statistics response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatsResponse {
    pub connected_client_count: usize,
    pub clients: Vec<ClientStats>,
}

fn format_age(seconds: i64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
