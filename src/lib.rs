// certstream - real-time Certificate Transparency log aggregator
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

//! certstream watches public Certificate Transparency logs, decodes every
//! newly appended entry into a structured certificate record and streams the
//! result as JSON to any number of websocket subscribers.
//!
//! The pipeline is one-directional: registry → [`ct_logs::watcher`] →
//! [`ct_logs::parser`] → [`stream::bus`] → [`stream::fanout`] → subscribers,
//! with [`supervisor::Supervisor`] owning the lifecycle.

pub mod api;
pub mod cli;
pub mod config;
pub mod ct_logs;
pub mod error;
pub mod stream;
pub mod supervisor;

// Re-export commonly used types
pub use crate::cli::Args;
pub use crate::config::Config;
pub use crate::error::{CertstreamError, DecodeError};
pub use crate::supervisor::Supervisor;

/// Result type for certstream operations
pub type Result<T> = std::result::Result<T, CertstreamError>;
