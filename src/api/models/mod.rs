// API Models Module
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod error;
pub mod response;

pub use error::{ApiError, ApiErrorResponse};
pub use response::{ClientStats, ConnectionStatsResponse, HealthResponse, LatestResponse};
