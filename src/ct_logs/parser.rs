// CT Log Entry Decoder
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Parses CT log entries (RFC 6962 Merkle Tree Leaf + extra_data chain) into
// certificate events. Stateless: every failure is a DecodeError scoped to the
// one entry being decoded.

use super::certificate::CertificateRecord;
use super::client::RawLogEntry;
use super::reader::LeafReader;
use super::sources::LogDescriptor;
use crate::error::DecodeError;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log entry type carried in the Merkle tree leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Final X.509 certificate
    #[serde(rename = "X509LogEntry")]
    X509,
    /// Precertificate submitted before issuance
    #[serde(rename = "PreCertEntry")]
    PreCert,
}

impl EntryType {
    fn from_wire(value: u16) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(EntryType::X509),
            1 => Ok(EntryType::PreCert),
            other => Err(DecodeError::UnknownEntryType(other)),
        }
    }
}

/// Decoded Merkle tree leaf header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleLeaf {
    pub version: u8,
    pub leaf_type: u8,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub entry_type: EntryType,
    /// Everything after the header; layout depends on `entry_type`
    pub entry: Vec<u8>,
}

impl MerkleLeaf {
    /// Parse the fixed header: version, leaf type, 8-byte timestamp,
    /// 2-byte entry type, then the entry payload.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = LeafReader::new(bytes);

        let version = reader.read_u8()?;
        if version != 0 {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let leaf_type = reader.read_u8()?;
        if leaf_type != 0 {
            return Err(DecodeError::UnsupportedLeafType(leaf_type));
        }

        let timestamp = reader.read_u64()?;
        let entry_type = EntryType::from_wire(reader.read_u16()?)?;

        Ok(Self {
            version,
            leaf_type,
            timestamp,
            entry_type,
            entry: reader.read_rest().to_vec(),
        })
    }

    /// Leaf timestamp as a UTC datetime
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp as i64)
    }
}

/// Log operator identity attached to each event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    pub url: String,
    #[serde(rename = "name")]
    pub description: String,
}

impl From<&LogDescriptor> for EventSource {
    fn from(log: &LogDescriptor) -> Self {
        Self {
            url: log.url.clone(),
            description: log.description.clone(),
        }
    }
}

/// Leaf certificate plus the domains it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafCertificate {
    #[serde(flatten)]
    pub record: CertificateRecord,
    /// CN first, then SAN DNS names; de-duplicated, first occurrence wins
    pub all_domains: Vec<String>,
}

/// One published certificate update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateEvent {
    #[serde(rename = "update_type")]
    pub entry_type: EntryType,
    pub leaf_cert: LeafCertificate,
    /// Issuance chain, root-ward
    pub chain: Vec<CertificateRecord>,
    /// Absolute position of the leaf in its log
    pub cert_index: u64,
    /// Decode time, fractional seconds since the Unix epoch
    #[serde(rename = "seen")]
    pub seen_at: f64,
    pub source: EventSource,
}

impl CertificateEvent {
    pub fn all_domains(&self) -> &[String] {
        &self.leaf_cert.all_domains
    }
}

/// Raw certificates extracted from one entry, before X.509 parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChain {
    pub entry_type: EntryType,
    pub leaf: Vec<u8>,
    pub chain: Vec<Vec<u8>>,
}

fn decode_base64(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|source| DecodeError::Base64 { field, source })
}

/// Read `ASN.1Cert certificate_chain<0..2^24-1>`: a 3-byte total length,
/// then length-prefixed certificates filling exactly that span.
fn read_chain(reader: &mut LeafReader<'_>) -> Result<Vec<Vec<u8>>, DecodeError> {
    let body = reader.read_opaque24()?;
    let mut chain_reader = LeafReader::new(body);
    let mut chain = Vec::new();

    while !chain_reader.is_empty() {
        chain.push(chain_reader.read_opaque24()?.to_vec());
    }

    Ok(chain)
}

/// Split an entry into raw DER certificates.
///
/// X509: the leaf is the length-prefixed certificate in the leaf payload and
/// `extra_data` is the chain. PreCert: `extra_data` holds the length-prefixed
/// precertificate followed by the chain, with no trailing bytes allowed.
pub fn extract_chain(entry: &RawLogEntry) -> Result<RawChain, DecodeError> {
    let leaf_bytes = decode_base64("leaf_input", &entry.leaf_input)?;
    let leaf = MerkleLeaf::parse(&leaf_bytes)?;
    let extra = decode_base64("extra_data", &entry.extra_data)?;

    match leaf.entry_type {
        EntryType::X509 => {
            let mut payload = LeafReader::new(&leaf.entry);
            let cert = payload.read_opaque24()?.to_vec();

            let mut extra_reader = LeafReader::new(&extra);
            let chain = read_chain(&mut extra_reader)?;

            Ok(RawChain {
                entry_type: EntryType::X509,
                leaf: cert,
                chain,
            })
        }
        EntryType::PreCert => {
            let mut extra_reader = LeafReader::new(&extra);
            let cert = extra_reader.read_opaque24()?.to_vec();
            let chain = read_chain(&mut extra_reader)?;
            extra_reader.finish()?;

            Ok(RawChain {
                entry_type: EntryType::PreCert,
                leaf: cert,
                chain,
            })
        }
    }
}

/// Domains covered by a leaf: CN (when present and non-empty) then every
/// `DNS:` token of the rendered subjectAltName, order preserved, duplicates
/// dropped.
pub fn all_domains(leaf: &CertificateRecord) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();

    if let Some(cn) = leaf.subject.common_name.as_deref()
        && !cn.is_empty()
    {
        domains.push(cn.to_string());
    }

    if let Some(san) = leaf.extension("subjectAltName") {
        for token in san.split(", ") {
            if let Some(domain) = token.strip_prefix("DNS:")
                && !domains.iter().any(|d| d == domain)
            {
                domains.push(domain.to_string());
            }
        }
    }

    domains
}

fn parse_record(der: &[u8], position: usize) -> Result<CertificateRecord, DecodeError> {
    CertificateRecord::from_der(der).map_err(|message| DecodeError::Certificate { position, message })
}

/// Decode one entry of `log` sitting at absolute position `index`
pub fn decode_entry(
    entry: &RawLogEntry,
    log: &LogDescriptor,
    index: u64,
) -> Result<CertificateEvent, DecodeError> {
    Parser::new(log).parse_entry(entry, index)
}

/// Entry decoder bound to one log
pub struct Parser {
    source: EventSource,
}

impl Parser {
    /// Create a new decoder for a specific log
    pub fn new(log: &LogDescriptor) -> Self {
        Self {
            source: EventSource::from(log),
        }
    }

    /// Decode one `get-entries` item sitting at absolute position `index`.
    pub fn parse_entry(
        &self,
        entry: &RawLogEntry,
        index: u64,
    ) -> Result<CertificateEvent, DecodeError> {
        let raw = extract_chain(entry)?;

        let leaf = parse_record(&raw.leaf, 0)?;
        let chain = raw
            .chain
            .iter()
            .enumerate()
            .map(|(i, der)| parse_record(der, i + 1))
            .collect::<Result<Vec<_>, _>>()?;

        let domains = all_domains(&leaf);
        let seen_at = Utc::now().timestamp_micros() as f64 / 1_000_000.0;

        Ok(CertificateEvent {
            entry_type: raw.entry_type,
            leaf_cert: LeafCertificate {
                record: leaf,
                all_domains: domains,
            },
            chain,
            cert_index: index,
            seen_at,
            source: self.source.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn header(entry_type: u16) -> Vec<u8> {
        let mut out = vec![0u8, 0u8];
        out.extend_from_slice(&1_700_000_000_000u64.to_be_bytes());
        out.extend_from_slice(&entry_type.to_be_bytes());
        out
    }

    fn opaque24(body: &[u8]) -> Vec<u8> {
        let len = body.len() as u32;
        let mut out = len.to_be_bytes()[1..].to_vec();
        out.extend_from_slice(body);
        out
    }

    fn record_with(cn: Option<&str>, san: Option<&str>) -> CertificateRecord {
        let mut extensions = BTreeMap::new();
        if let Some(san) = san {
            extensions.insert("subjectAltName".to_string(), san.to_string());
        }
        CertificateRecord {
            subject: crate::ct_logs::certificate::Subject {
                common_name: cn.map(str::to_string),
                ..Default::default()
            },
            extensions,
            not_before: 0,
            not_after: 0,
            serial_number: String::new(),
            fingerprint: String::new(),
            as_der: String::new(),
        }
    }

    #[test]
    fn test_merkle_leaf_header() {
        let mut bytes = header(1);
        bytes.extend_from_slice(&[0xAA, 0xBB]);

        let leaf = MerkleLeaf::parse(&bytes).unwrap();
        assert_eq!(leaf.version, 0);
        assert_eq!(leaf.leaf_type, 0);
        assert_eq!(leaf.timestamp, 1_700_000_000_000);
        assert_eq!(leaf.entry_type, EntryType::PreCert);
        assert_eq!(leaf.entry, vec![0xAA, 0xBB]);
        assert_eq!(leaf.timestamp_utc().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_merkle_leaf_rejects_unknown_entry_type() {
        let bytes = header(7);
        assert!(matches!(
            MerkleLeaf::parse(&bytes),
            Err(DecodeError::UnknownEntryType(7))
        ));
    }

    #[test]
    fn test_merkle_leaf_rejects_short_header() {
        assert!(matches!(
            MerkleLeaf::parse(&[0, 0, 1, 2]),
            Err(DecodeError::Truncated { .. })
        ));
        assert!(matches!(
            MerkleLeaf::parse(&[1]),
            Err(DecodeError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn test_extract_x509_chain() {
        let mut leaf_input = header(0);
        leaf_input.extend(opaque24(b"LEAF"));
        // CtExtensions follow the certificate in a TimestampedEntry
        leaf_input.extend_from_slice(&[0, 0]);

        let mut chain_body = opaque24(b"INTERMEDIATE");
        chain_body.extend(opaque24(b"ROOT"));

        let entry = RawLogEntry {
            leaf_input: b64(&leaf_input),
            extra_data: b64(&opaque24(&chain_body)),
        };

        let raw = extract_chain(&entry).unwrap();
        assert_eq!(raw.entry_type, EntryType::X509);
        assert_eq!(raw.leaf, b"LEAF");
        assert_eq!(raw.chain, vec![b"INTERMEDIATE".to_vec(), b"ROOT".to_vec()]);
    }

    #[test]
    fn test_extract_precert_rejects_trailing_byte() {
        let mut extra = opaque24(b"PRECERT");
        extra.extend(opaque24(&opaque24(b"ISSUER")));

        let good = RawLogEntry {
            leaf_input: b64(&header(1)),
            extra_data: b64(&extra),
        };
        let raw = extract_chain(&good).unwrap();
        assert_eq!(raw.leaf, b"PRECERT");
        assert_eq!(raw.chain.len(), 1);

        extra.push(0x00);
        let bad = RawLogEntry {
            leaf_input: b64(&header(1)),
            extra_data: b64(&extra),
        };
        assert!(matches!(
            extract_chain(&bad),
            Err(DecodeError::TrailingBytes { count: 1 })
        ));
    }

    #[test]
    fn test_extract_length_overrun() {
        let mut leaf_input = header(0);
        leaf_input.extend_from_slice(&[0x00, 0x10, 0x00, 0x01]);

        let entry = RawLogEntry {
            leaf_input: b64(&leaf_input),
            extra_data: b64(&opaque24(&[])),
        };
        assert!(matches!(
            extract_chain(&entry),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_extract_bad_base64() {
        let entry = RawLogEntry {
            leaf_input: "%%%".to_string(),
            extra_data: String::new(),
        };
        assert!(matches!(
            extract_chain(&entry),
            Err(DecodeError::Base64 { field: "leaf_input", .. })
        ));
    }

    #[test]
    fn test_all_domains_cn_first_and_deduplicated() {
        let leaf = record_with(Some("a.com"), Some("DNS:b.com, DNS:a.com"));
        assert_eq!(all_domains(&leaf), vec!["a.com", "b.com"]);
    }

    #[test]
    fn test_all_domains_skips_empty_cn_and_non_dns() {
        let leaf = record_with(
            Some(""),
            Some("email:x@y.com, DNS:c.com, IP Address:10.0.0.1, DNS:c.com"),
        );
        assert_eq!(all_domains(&leaf), vec!["c.com"]);

        let bare = record_with(None, None);
        assert!(all_domains(&bare).is_empty());
    }

    #[test]
    fn test_entry_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&EntryType::X509).unwrap(),
            "\"X509LogEntry\""
        );
        assert_eq!(
            serde_json::to_string(&EntryType::PreCert).unwrap(),
            "\"PreCertEntry\""
        );
    }
}
