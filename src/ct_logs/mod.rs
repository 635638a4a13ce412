// Certificate Transparency Logs Module
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Ingestion side of the pipeline: registry loading, per-log watchers and the
// binary entry decoder.

pub mod certificate;
pub mod client;
pub mod parser;
pub mod reader;
pub mod sources;
pub mod stats;
pub mod watcher;

pub use certificate::{CertificateRecord, Subject};
pub use client::{CtClient, LogApi, RawLogEntry};
pub use parser::{decode_entry, CertificateEvent, EntryType, EventSource, MerkleLeaf, Parser};
pub use sources::{LogDescriptor, LogRegistry};
pub use stats::{Stats, StatsTracker};
pub use watcher::{PerLogWatcher, StartPosition, WatcherSettings, WatcherState};

use crate::error::CertstreamError;

/// Result type for CT logs operations
pub type Result<T> = std::result::Result<T, CertstreamError>;
