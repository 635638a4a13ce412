// API Module - websocket stream and snapshot endpoints
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use server::ApiServer;
pub use state::AppState;
