// Error types for certstream
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Structured error types built with thiserror. `CertstreamError` is what the
// ingestion pipeline propagates; `DecodeError` is scoped to a single log entry
// and is always recoverable by skipping that entry.

use std::io;
use thiserror::Error;

/// Main error type for certstream operations
#[derive(Debug, Error)]
pub enum CertstreamError {
    /// Reqwest transport failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("HTTP error (status {status}): {details}")]
    Http { status: u16, details: String },

    /// Upstream answered with a body we could not use
    #[error("Unexpected upstream response: {details}")]
    UnexpectedResponse { details: String },

    /// The log registry could not be loaded at startup
    #[error("Log registry unavailable: {message}")]
    Registry { message: String },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Generic I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration parse errors
    #[error("Configuration parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML configuration render errors
    #[error("Configuration render error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// The shutdown token fired while the operation was suspended
    #[error("Operation cancelled by shutdown")]
    Cancelled,

    /// The event bus consumer is gone
    #[error("Event bus closed")]
    BusClosed,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl CertstreamError {
    /// Whether the failure is a transient upstream problem that the next
    /// poll cycle may not hit again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CertstreamError::Transport(_)
                | CertstreamError::Http { .. }
                | CertstreamError::UnexpectedResponse { .. }
        )
    }
}

/// Failure to decode one Merkle tree leaf or its certificate chain
#[derive(Debug, Error)]
pub enum DecodeError {
    /// `leaf_input` or `extra_data` was not valid base64
    #[error("Invalid base64 in {field}: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A fixed-width field or length-prefixed body ran past the buffer
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Bytes were left over after a structure that must consume its input
    #[error("{count} unconsumed trailing bytes")]
    TrailingBytes { count: usize },

    /// Merkle tree leaf version other than v1
    #[error("Unsupported leaf version: {0}")]
    UnsupportedVersion(u8),

    /// Merkle leaf type other than timestamped_entry
    #[error("Unsupported Merkle leaf type: {0}")]
    UnsupportedLeafType(u8),

    /// LogEntryType outside {x509_entry, precert_entry}
    #[error("Unknown log entry type: {0}")]
    UnknownEntryType(u16),

    /// A DER certificate failed X.509 parsing; position 0 is the leaf,
    /// 1.. are chain members in root-ward order
    #[error("Unparseable certificate at chain position {position}: {message}")]
    Certificate { position: usize, message: String },
}

impl From<tokio::task::JoinError> for CertstreamError {
    fn from(err: tokio::task::JoinError) -> Self {
        CertstreamError::Other(format!("Task join error: {}", err))
    }
}
