// Recent History Routes
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::api::{
    models::{ApiError, LatestResponse},
    state::AppState,
};
use axum::{extract::State, Json};
use serde_json::Value;
use std::sync::Arc;

/// Last retained certificate updates, oldest first
pub async fn latest(State(state): State<Arc<AppState>>) -> Json<LatestResponse> {
    Json(LatestResponse {
        messages: state.history.snapshot(),
    })
}

/// Oldest retained update, or `{}` before the first one arrives
pub async fn example(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    match state.history.oldest() {
        Some(message) => Ok(Json(serde_json::to_value(message)?)),
        None => Ok(Json(Value::Object(Default::default()))),
    }
}
