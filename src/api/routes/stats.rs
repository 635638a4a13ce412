// Connection Statistics Route
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::api::{
    models::{ClientStats, ConnectionStatsResponse},
    state::AppState,
};
use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

/// Connected subscribers with address, age and channel
pub async fn connection_stats(State(state): State<Arc<AppState>>) -> Json<ConnectionStatsResponse> {
    let now = Utc::now();
    let clients: Vec<ClientStats> = state
        .registry
        .snapshot()
        .await
        .into_iter()
        .map(|info| ClientStats::from_info(info, now))
        .collect();

    Json(ConnectionStatsResponse {
        connected_client_count: clients.len(),
        clients,
    })
}
