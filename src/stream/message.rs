// Outbound Messages
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// JSON messages pushed to subscribers and the per-channel projections of a
// certificate update. Frames are rendered once per event and shared by every
// subscriber on the same channel.

use crate::ct_logs::parser::{CertificateEvent, EntryType, EventSource, LeafCertificate};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Pre-rendered JSON text frame
pub type Frame = Arc<str>;

/// Subscriber-side projection of the event stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Full event
    #[default]
    Default,
    /// Domains plus minimal metadata
    DnsOnly,
    /// Leaf certificate without the chain
    LeafOnly,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Default, Channel::DnsOnly, Channel::LeafOnly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Default => "default",
            Channel::DnsOnly => "dns-only",
            Channel::LeafOnly => "leaf-only",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel selector outside the known set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown channel '{0}' (expected default, dns-only or leaf-only)")]
pub struct InvalidChannel(pub String);

impl FromStr for Channel {
    type Err = InvalidChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| InvalidChannel(s.to_string()))
    }
}

/// Messages sent to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum StreamMessage {
    CertificateUpdate { data: CertificateEvent },
    /// Liveness ping; `timestamp` is fractional epoch seconds
    Heartbeat { timestamp: f64 },
}

impl StreamMessage {
    pub fn update(event: CertificateEvent) -> Self {
        StreamMessage::CertificateUpdate { data: event }
    }

    pub fn heartbeat() -> Self {
        StreamMessage::Heartbeat {
            timestamp: Utc::now().timestamp_micros() as f64 / 1_000_000.0,
        }
    }

    pub fn to_frame(&self) -> serde_json::Result<Frame> {
        serde_json::to_string(self).map(Frame::from)
    }
}

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    message_type: &'static str,
    data: T,
}

#[derive(Serialize)]
struct LeafOnlyData<'a> {
    update_type: EntryType,
    leaf_cert: &'a LeafCertificate,
    cert_index: u64,
    seen: f64,
    source: &'a EventSource,
}

#[derive(Serialize)]
struct DnsOnlyData<'a> {
    update_type: EntryType,
    cert_index: u64,
    seen: f64,
    source: &'a EventSource,
    all_domains: &'a [String],
}

/// One certificate update rendered for every channel
#[derive(Debug, Clone)]
pub struct UpdateFrames {
    default: Frame,
    dns_only: Frame,
    leaf_only: Frame,
}

impl UpdateFrames {
    pub fn render(event: &CertificateEvent) -> serde_json::Result<Self> {
        let default = serde_json::to_string(&Envelope {
            message_type: "certificate_update",
            data: event,
        })?;

        let leaf_only = serde_json::to_string(&Envelope {
            message_type: "certificate_update",
            data: LeafOnlyData {
                update_type: event.entry_type,
                leaf_cert: &event.leaf_cert,
                cert_index: event.cert_index,
                seen: event.seen_at,
                source: &event.source,
            },
        })?;

        let dns_only = serde_json::to_string(&Envelope {
            message_type: "certificate_update",
            data: DnsOnlyData {
                update_type: event.entry_type,
                cert_index: event.cert_index,
                seen: event.seen_at,
                source: &event.source,
                all_domains: event.all_domains(),
            },
        })?;

        Ok(Self {
            default: default.into(),
            dns_only: dns_only.into(),
            leaf_only: leaf_only.into(),
        })
    }

    pub fn for_channel(&self, channel: Channel) -> Frame {
        match channel {
            Channel::Default => Arc::clone(&self.default),
            Channel::DnsOnly => Arc::clone(&self.dns_only),
            Channel::LeafOnly => Arc::clone(&self.leaf_only),
        }
    }
}
