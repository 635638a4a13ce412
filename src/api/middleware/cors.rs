// CORS Middleware
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use tower_http::cors::{Any, CorsLayer};

/// Permissive CORS so browser dashboards on other origins can read the
/// snapshot endpoints
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}
