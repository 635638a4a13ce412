// Health Check Route
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::api::{models::HealthResponse, state::AppState};
use axum::{extract::State, Json};
use std::sync::Arc;

/// Health check endpoint
///
/// Returns uptime, subscriber count and the ingest counters of every log
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        connected_clients: state.registry.len().await,
        history_size: state.history.len(),
        publish_rate: state.stats.get_publish_rate(),
        ingest: state.stats.get_snapshot(),
    })
}
