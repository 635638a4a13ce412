// Middleware Module
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

pub mod cors;
pub mod logging;

pub use cors::cors_layer;
pub use logging::logging_layer;
