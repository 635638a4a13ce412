// API Server Implementation
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use crate::api::{middleware, routes, state::AppState, ws};
use crate::config::ServerConfig;
use crate::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Websocket and snapshot server
pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let stats_path = format!("/{}", self.config.stats_path.trim_matches('/'));

        let router = Router::new()
            .route("/", get(ws::handle_websocket))
            .route("/latest.json", get(routes::history::latest))
            .route("/example.json", get(routes::history::example))
            .route("/health", get(routes::health::health_check))
            .route(&stats_path, get(routes::stats::connection_stats));

        let router = if self.config.enable_cors {
            router.layer(middleware::cors_layer())
        } else {
            router
        };

        router
            .layer(middleware::logging_layer())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` fires
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let app = self.build_router();
        let addr = listener.local_addr()?;

        info!("certstream listening on ws://{}/", addr);
        info!("Recent updates: http://{}/latest.json", addr);
        info!("Connection stats: http://{}/{}", addr, self.config.stats_path);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Get the application state
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }
}
