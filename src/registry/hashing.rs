//! Exploit hashing and record tagging.
//!
//! The exploit payload only lives long enough to be hashed. It is held in a
//! buffer that is wiped on drop and never printed.

use crate::registry::record::VulnerabilityRecord;
use crate::registry::stats::risk_bucket;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw exploit content. Wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ExploitPayload(String);

impl ExploitPayload {
    /// Wrap raw exploit text.
    #[must_use]
    pub fn new(exploit: impl Into<String>) -> Self {
        Self(exploit.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ExploitPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExploitPayload([REDACTED])")
    }
}

impl From<String> for ExploitPayload {
    fn from(exploit: String) -> Self {
        Self(exploit)
    }
}

impl From<&str> for ExploitPayload {
    fn from(exploit: &str) -> Self {
        Self(exploit.to_string())
    }
}

/// Lowercase hex SHA-256 of an exploit payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExploitHash(String);

impl ExploitHash {
    /// Hex digest length.
    pub const HEX_LEN: usize = 64;

    /// Parse a hex digest, accepting either case.
    #[must_use]
    pub fn from_hex(hex_digest: &str) -> Option<Self> {
        let valid = hex_digest.len() == Self::HEX_LEN
            && hex_digest.bytes().all(|b| b.is_ascii_hexdigit());
        valid.then(|| Self(hex_digest.to_ascii_lowercase()))
    }

    /// The digest as hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExploitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash an exploit, consuming it. The payload is wiped before this returns.
#[must_use]
pub fn hash_exploit(payload: ExploitPayload) -> ExploitHash {
    let digest = Sha256::digest(payload.as_bytes());
    drop(payload);
    ExploitHash(hex::encode(digest))
}

/// Tag under which a record is found by its exploit hash.
#[must_use]
pub fn hash_tag(hash: &ExploitHash) -> String {
    format!("hash:{hash}")
}

/// Tag for a vulnerability type.
#[must_use]
pub fn type_tag(vulnerability_type: &str) -> String {
    format!("type:{}", normalize(vulnerability_type))
}

/// Tag for a language.
#[must_use]
pub fn language_tag(language: &str) -> String {
    format!("lang:{}", normalize(language))
}

/// Tag for a framework.
#[must_use]
pub fn framework_tag(framework: &str) -> String {
    format!("framework:{}", normalize(framework))
}

/// Tag for an attack vector.
#[must_use]
pub fn attack_vector_tag(attack_vector: &str) -> String {
    format!("vector:{}", normalize(attack_vector))
}

/// Tag for an auditor.
#[must_use]
pub fn auditor_tag(auditor_id: &str) -> String {
    format!("auditor:{auditor_id}")
}

/// Tag for the bounty status.
#[must_use]
pub fn bounty_tag(paid: bool) -> String {
    if paid {
        "bounty:paid".to_string()
    } else {
        "bounty:unpaid".to_string()
    }
}

/// Canonical form of a free-text field for tags, filters and statistics.
pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Derive the search tags of a record. Same record, same tags, same order.
#[must_use]
pub fn generate_tags(record: &VulnerabilityRecord) -> Vec<String> {
    let mut tags = vec![
        hash_tag(&record.exploit_hash),
        type_tag(&record.vulnerability_type),
        format!("risk:{}", risk_bucket(record.risk_score).unwrap_or("below-90")),
        auditor_tag(&record.auditor_id),
    ];

    let meta = &record.metadata;
    if let Some(language) = meta.language.as_deref() {
        tags.push(language_tag(language));
    }
    if let Some(framework) = meta.framework.as_deref() {
        tags.push(framework_tag(framework));
    }
    if let Some(vector) = meta.attack_vector.as_deref() {
        tags.push(attack_vector_tag(vector));
    }

    let mut projects: Vec<String> = record
        .affected_projects
        .iter()
        .map(|p| format!("project:{}", normalize(p)))
        .collect();
    projects.sort();
    projects.dedup();
    tags.extend(projects);

    tags.push(bounty_tag(record.bounty_paid));
    tags
}
