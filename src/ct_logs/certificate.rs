// Certificate records
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// Normalizes a DER X.509 certificate into the JSON-friendly record published
// to subscribers: subject fields, extension short-name -> rendered value map,
// validity window and the DER itself.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use x509_parser::prelude::*;

/// RFC 6962 precertificate poison extension
const CT_PRECERT_POISON_OID: &str = "1.3.6.1.4.1.11129.2.4.3";

/// Subject distinguished-name components
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Full distinguished name as a single string
    pub aggregated: Option<String>,
    #[serde(rename = "C")]
    pub country: Option<String>,
    #[serde(rename = "ST")]
    pub state: Option<String>,
    #[serde(rename = "L")]
    pub locality: Option<String>,
    #[serde(rename = "O")]
    pub organization: Option<String>,
    #[serde(rename = "OU")]
    pub organizational_unit: Option<String>,
    #[serde(rename = "CN")]
    pub common_name: Option<String>,
}

/// One certificate, leaf or chain member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub subject: Subject,
    /// Extension short name -> rendered value. Extensions that cannot be
    /// parsed or rendered are left out.
    pub extensions: BTreeMap<String, String>,
    /// Validity start, seconds since the Unix epoch
    pub not_before: i64,
    /// Validity end, seconds since the Unix epoch
    pub not_after: i64,
    /// Serial number, upper-case hex
    pub serial_number: String,
    /// SHA-256 over the DER, colon-separated upper-case hex
    pub fingerprint: String,
    /// DER encoding, standard base64
    pub as_der: String,
}

impl CertificateRecord {
    /// Parse a DER certificate.
    ///
    /// Fails only when the certificate itself is unparseable; individual
    /// extensions that do not parse are skipped.
    pub fn from_der(der: &[u8]) -> std::result::Result<Self, String> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;

        let subject = subject_fields(cert.subject());
        let extensions = dump_extensions(&cert);

        Ok(Self {
            subject,
            extensions,
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            serial_number: hex::encode_upper(cert.raw_serial()),
            fingerprint: colon_hex(&Sha256::digest(der)),
            as_der: base64::engine::general_purpose::STANDARD.encode(der),
        })
    }

    /// Decode `as_der` back into bytes
    pub fn der_bytes(&self) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.as_der)
    }

    /// Look up a rendered extension by its short name
    pub fn extension(&self, short_name: &str) -> Option<&str> {
        self.extensions.get(short_name).map(String::as_str)
    }
}

fn first_attr<'a, 'b: 'a>(
    mut iter: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> Option<String> {
    iter.next()
        .and_then(|attr| attr.as_str().ok())
        .map(|s| s.to_string())
}

fn subject_fields(name: &X509Name<'_>) -> Subject {
    let aggregated = name.to_string();

    Subject {
        aggregated: (!aggregated.is_empty()).then_some(aggregated),
        country: first_attr(name.iter_country()),
        state: first_attr(name.iter_state_or_province()),
        locality: first_attr(name.iter_locality()),
        organization: first_attr(name.iter_organization()),
        organizational_unit: first_attr(name.iter_organizational_unit()),
        common_name: first_attr(name.iter_common_name()),
    }
}

/// Render every extension we know how to name, keyed the way OpenSSL names
/// them (`subjectAltName`, `basicConstraints`, ...).
fn dump_extensions(cert: &X509Certificate<'_>) -> BTreeMap<String, String> {
    let mut extensions = BTreeMap::new();

    for ext in cert.extensions() {
        if ext.oid.to_id_string() == CT_PRECERT_POISON_OID {
            extensions.insert("ct_precert_poison".to_string(), "NULL".to_string());
            continue;
        }
        if let Some((name, value)) = render_extension(ext.parsed_extension()) {
            extensions.insert(name.to_string(), value);
        }
    }

    extensions
}

fn render_extension(parsed: &ParsedExtension<'_>) -> Option<(&'static str, String)> {
    match parsed {
        ParsedExtension::SubjectAlternativeName(san) => Some((
            "subjectAltName",
            render_general_names(&san.general_names),
        )),
        ParsedExtension::IssuerAlternativeName(ian) => Some((
            "issuerAltName",
            render_general_names(&ian.general_names),
        )),
        ParsedExtension::BasicConstraints(bc) => {
            let mut value = if bc.ca { "CA:TRUE" } else { "CA:FALSE" }.to_string();
            if let Some(len) = bc.path_len_constraint {
                value.push_str(&format!(", pathlen:{}", len));
            }
            Some(("basicConstraints", value))
        }
        ParsedExtension::KeyUsage(ku) => {
            let flags = [
                (ku.digital_signature(), "Digital Signature"),
                (ku.non_repudiation(), "Non Repudiation"),
                (ku.key_encipherment(), "Key Encipherment"),
                (ku.data_encipherment(), "Data Encipherment"),
                (ku.key_agreement(), "Key Agreement"),
                (ku.key_cert_sign(), "Certificate Sign"),
                (ku.crl_sign(), "CRL Sign"),
                (ku.encipher_only(), "Encipher Only"),
                (ku.decipher_only(), "Decipher Only"),
            ];
            let names: Vec<&str> = flags
                .iter()
                .filter(|(set, _)| *set)
                .map(|(_, name)| *name)
                .collect();
            Some(("keyUsage", names.join(", ")))
        }
        ParsedExtension::ExtendedKeyUsage(eku) => {
            let mut names: Vec<String> = Vec::new();
            let flags = [
                (eku.any, "Any Extended Key Usage"),
                (eku.server_auth, "TLS Web Server Authentication"),
                (eku.client_auth, "TLS Web Client Authentication"),
                (eku.code_signing, "Code Signing"),
                (eku.email_protection, "E-mail Protection"),
                (eku.time_stamping, "Time Stamping"),
                (eku.ocsp_signing, "OCSP Signing"),
            ];
            for (set, name) in flags {
                if set {
                    names.push(name.to_string());
                }
            }
            names.extend(eku.other.iter().map(|oid| oid.to_id_string()));
            Some(("extendedKeyUsage", names.join(", ")))
        }
        ParsedExtension::SubjectKeyIdentifier(kid) => {
            Some(("subjectKeyIdentifier", colon_hex(kid.0)))
        }
        ParsedExtension::AuthorityKeyIdentifier(aki) => aki
            .key_identifier
            .as_ref()
            .map(|kid| ("authorityKeyIdentifier", format!("keyid:{}", colon_hex(kid.0)))),
        ParsedExtension::AuthorityInfoAccess(aia) => {
            let entries: Vec<String> = aia
                .accessdescs
                .iter()
                .map(|desc| {
                    let method = match desc.access_method.to_id_string().as_str() {
                        "1.3.6.1.5.5.7.48.1" => "OCSP".to_string(),
                        "1.3.6.1.5.5.7.48.2" => "CA Issuers".to_string(),
                        other => other.to_string(),
                    };
                    format!(
                        "{} - {}",
                        method,
                        render_general_name(&desc.access_location)
                    )
                })
                .collect();
            Some(("authorityInfoAccess", entries.join(", ")))
        }
        ParsedExtension::CertificatePolicies(policies) => {
            let entries: Vec<String> = policies
                .iter()
                .map(|policy| format!("Policy: {}", policy.policy_id.to_id_string()))
                .collect();
            Some(("certificatePolicies", entries.join(", ")))
        }
        ParsedExtension::PolicyMappings(mappings) => {
            let entries: Vec<String> = mappings
                .mappings
                .iter()
                .map(|m| {
                    format!(
                        "{}:{}",
                        m.issuer_domain_policy.to_id_string(),
                        m.subject_domain_policy.to_id_string()
                    )
                })
                .collect();
            Some(("policyMappings", entries.join(", ")))
        }
        ParsedExtension::PolicyConstraints(pc) => {
            let mut parts = Vec::new();
            if let Some(n) = pc.require_explicit_policy {
                parts.push(format!("Require Explicit Policy:{}", n));
            }
            if let Some(n) = pc.inhibit_policy_mapping {
                parts.push(format!("Inhibit Policy Mapping:{}", n));
            }
            Some(("policyConstraints", parts.join(", ")))
        }
        ParsedExtension::InhibitAnyPolicy(iap) => {
            Some(("inhibitAnyPolicy", iap.skip_certs.to_string()))
        }
        ParsedExtension::NameConstraints(nc) => {
            let mut parts = Vec::new();
            for (label, subtrees) in [
                ("Permitted", &nc.permitted_subtrees),
                ("Excluded", &nc.excluded_subtrees),
            ] {
                if let Some(subtrees) = subtrees {
                    let names: Vec<String> = subtrees
                        .iter()
                        .map(|subtree| render_general_name(&subtree.base))
                        .collect();
                    parts.push(format!("{}: {}", label, names.join(", ")));
                }
            }
            Some(("nameConstraints", parts.join("; ")))
        }
        ParsedExtension::CRLDistributionPoints(points) => {
            let entries: Vec<String> = points
                .iter()
                .filter_map(|point| point.distribution_point.as_ref())
                .map(render_distribution_point)
                .collect();
            Some(("crlDistributionPoints", entries.join(", ")))
        }
        ParsedExtension::IssuingDistributionPoint(idp) => Some((
            "issuingDistributionPoint",
            idp.distribution_point
                .as_ref()
                .map(render_distribution_point)
                .unwrap_or_default(),
        )),
        ParsedExtension::SCT(scts) => {
            let entries: Vec<String> = scts
                .iter()
                .map(|sct| {
                    format!(
                        "v{} LogID:{} Timestamp:{}",
                        u16::from(sct.version.0) + 1,
                        colon_hex(sct.id.key_id),
                        sct.timestamp
                    )
                })
                .collect();
            Some(("ct_precert_scts", entries.join(", ")))
        }
        ParsedExtension::NSCertType(cert_type) => Some(("nsCertType", cert_type.to_string())),
        ParsedExtension::NsCertComment(comment) => Some(("nsComment", comment.to_string())),
        ParsedExtension::CRLNumber(number) => Some(("crlNumber", number.to_string())),
        ParsedExtension::ReasonCode(code) => Some(("reasonCode", code.0.to_string())),
        ParsedExtension::InvalidityDate(date) => Some(("invalidityDate", date.to_string())),
        ParsedExtension::UnsupportedExtension { .. }
        | ParsedExtension::ParseError { .. }
        | ParsedExtension::Unparsed => None,
    }
}

fn render_distribution_point(point: &DistributionPointName<'_>) -> String {
    match point {
        DistributionPointName::FullName(names) => render_general_names(names),
        DistributionPointName::NameRelativeToCRLIssuer(rdn) => rdn
            .iter()
            .filter_map(|attr| attr.as_str().ok())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn render_general_names(names: &[GeneralName<'_>]) -> String {
    names
        .iter()
        .map(render_general_name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_general_name(name: &GeneralName<'_>) -> String {
    match name {
        GeneralName::DNSName(dns) => format!("DNS:{}", dns),
        GeneralName::RFC822Name(email) => format!("email:{}", email),
        GeneralName::URI(uri) => format!("URI:{}", uri),
        GeneralName::IPAddress(ip) => format!("IP Address:{}", render_ip(ip)),
        GeneralName::DirectoryName(dn) => format!("DirName:{}", dn),
        other => other.to_string(),
    }
}

fn render_ip(raw: &[u8]) -> String {
    match raw.len() {
        4 => std::net::Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]).to_string(),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(raw);
            std::net::Ipv6Addr::from(octets).to_string()
        }
        _ => hex::encode(raw),
    }
}

fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
