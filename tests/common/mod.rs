// Shared test fixtures
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Mints throwaway certificates with OpenSSL and wraps them in RFC 6962
// get-entries items.

#![allow(dead_code)]

use base64::Engine;
use certstream::ct_logs::RawLogEntry;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509Builder, X509Extension, X509NameBuilder};

pub const LEAF_TIMESTAMP_MS: u64 = 1_700_000_000_000;

/// Self-signed DER certificate with the given CN and SAN DNS names
pub fn mint_certificate(common_name: &str, dns_names: &[&str], ca: bool) -> Vec<u8> {
    mint_certificate_with_extensions(common_name, dns_names, ca, &[])
}

/// Like `mint_certificate`, plus extensions in OpenSSL config syntax,
/// e.g. `("crlDistributionPoints", "URI:http://crl.example/ca.crl")`
pub fn mint_certificate_with_extensions(
    common_name: &str,
    dns_names: &[&str],
    ca: bool,
    extra: &[(&str, &str)],
) -> Vec<u8> {
    let rsa = Rsa::generate(2048).unwrap();
    let pkey = PKey::from_rsa(rsa).unwrap();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    let serial = serial.to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();

    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder.append_entry_by_text("C", "US").unwrap();
    name_builder.append_entry_by_text("O", "Certstream Test").unwrap();
    name_builder.append_entry_by_text("CN", common_name).unwrap();
    let name = name_builder.build();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();

    let not_before = Asn1Time::days_from_now(0).unwrap();
    let not_after = Asn1Time::days_from_now(90).unwrap();
    builder.set_not_before(&not_before).unwrap();
    builder.set_not_after(&not_after).unwrap();
    builder.set_pubkey(&pkey).unwrap();

    if ca {
        let constraints = BasicConstraints::new().critical().ca().build().unwrap();
        builder.append_extension(constraints).unwrap();
    }

    if !dns_names.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for dns in dns_names {
            san.dns(dns);
        }
        let san = san.build(&builder.x509v3_context(None, None)).unwrap();
        builder.append_extension(san).unwrap();
    }

    let extensions: Vec<X509Extension> = {
        let context = builder.x509v3_context(None, None);
        extra
            .iter()
            .map(|(name, value)| {
                #[allow(deprecated)]
                X509Extension::new(None, Some(&context), name, value).unwrap()
            })
            .collect()
    };
    for extension in extensions {
        builder.append_extension(extension).unwrap();
    }

    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    builder.build().to_der().unwrap()
}

pub fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// `opaque<0..2^24-1>`: 3-byte big-endian length then the body
pub fn opaque24(body: &[u8]) -> Vec<u8> {
    let len = body.len() as u32;
    let mut out = len.to_be_bytes()[1..].to_vec();
    out.extend_from_slice(body);
    out
}

fn leaf_header(entry_type: u16) -> Vec<u8> {
    let mut out = vec![0u8, 0u8];
    out.extend_from_slice(&LEAF_TIMESTAMP_MS.to_be_bytes());
    out.extend_from_slice(&entry_type.to_be_bytes());
    out
}

fn chain_body(chain: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    for cert in chain {
        body.extend(opaque24(cert));
    }
    opaque24(&body)
}

/// X509LogEntry: the leaf sits in leaf_input, extra_data is the chain
pub fn x509_entry(leaf: &[u8], chain: &[Vec<u8>]) -> RawLogEntry {
    let mut leaf_input = leaf_header(0);
    leaf_input.extend(opaque24(leaf));
    leaf_input.extend_from_slice(&[0, 0]);

    RawLogEntry {
        leaf_input: b64(&leaf_input),
        extra_data: b64(&chain_body(chain)),
    }
}

/// PreCertEntry: extra_data carries the precertificate then the chain
pub fn precert_entry(precert: &[u8], chain: &[Vec<u8>], trailing: &[u8]) -> RawLogEntry {
    let mut leaf_input = leaf_header(1);
    // issuer_key_hash + TBSCertificate, not consumed by the decoder
    leaf_input.extend_from_slice(&[0u8; 32]);
    leaf_input.extend(opaque24(b"tbs"));
    leaf_input.extend_from_slice(&[0, 0]);

    let mut extra = opaque24(precert);
    extra.extend(chain_body(chain));
    extra.extend_from_slice(trailing);

    RawLogEntry {
        leaf_input: b64(&leaf_input),
        extra_data: b64(&extra),
    }
}
