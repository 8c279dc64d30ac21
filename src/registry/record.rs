//! Registry data model.

use crate::registry::hashing::{
    attack_vector_tag, auditor_tag, bounty_tag, framework_tag, language_tag, normalize,
    type_tag, ExploitHash, ExploitPayload,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional classification of a vulnerability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityMetadata {
    /// Source language of the affected code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Framework of the affected code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    /// How the vulnerability is exploited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_vector: Option<String>,
}

/// A verified vulnerability submitted for registration.
///
/// This is the only type that carries the raw exploit. Registration consumes
/// it and keeps nothing but the hash.
#[derive(Debug)]
pub struct ProofData {
    /// Proof the vulnerability was verified under.
    pub proof_id: String,
    /// Raw exploit content.
    pub exploit: ExploitPayload,
    /// Risk score assigned by verification.
    pub risk_score: u32,
    /// Vulnerability class, e.g. "reentrancy".
    pub vulnerability_type: String,
    /// Projects the exploit applies to.
    pub affected_projects: Vec<String>,
    /// When the auditor found it.
    pub discovered_at: DateTime<Utc>,
    /// When verification succeeded. Defaults to registration time.
    pub verified_at: Option<DateTime<Utc>>,
    /// Discoverer.
    pub auditor_id: String,
    /// Optional classification.
    pub metadata: VulnerabilityMetadata,
}

/// A registered vulnerability. Never contains the raw exploit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityRecord {
    /// Owning proof, also the storage id.
    pub proof_id: String,
    /// One-way digest of the exploit.
    pub exploit_hash: ExploitHash,
    /// Risk score assigned by verification.
    pub risk_score: u32,
    /// Vulnerability class.
    pub vulnerability_type: String,
    /// Projects the exploit applies to.
    pub affected_projects: Vec<String>,
    /// When the auditor found it.
    pub discovered_at: DateTime<Utc>,
    /// When verification succeeded.
    pub verified_at: DateTime<Utc>,
    /// Discoverer.
    pub auditor_id: String,
    /// Set once the bounty for this proof has been paid.
    pub bounty_paid: bool,
    /// Optional classification.
    #[serde(default)]
    pub metadata: VulnerabilityMetadata,
}

/// Conjunction of optional predicates over registered vulnerabilities.
///
/// Equality predicates on type, language, framework, attack vector, auditor
/// and bounty status are pushed down to the store as tags. Risk and date
/// ranges are applied afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    /// Lowest risk score, inclusive.
    pub min_risk_score: Option<u32>,
    /// Highest risk score, inclusive.
    pub max_risk_score: Option<u32>,
    /// Vulnerability class, case-insensitive.
    pub vulnerability_type: Option<String>,
    /// Language, case-insensitive.
    pub language: Option<String>,
    /// Framework, case-insensitive.
    pub framework: Option<String>,
    /// Attack vector, case-insensitive.
    pub attack_vector: Option<String>,
    /// Discovered at or after.
    pub discovered_after: Option<DateTime<Utc>>,
    /// Discovered at or before.
    pub discovered_before: Option<DateTime<Utc>>,
    /// Discoverer.
    pub auditor_id: Option<String>,
    /// Bounty status.
    pub bounty_paid: Option<bool>,
    /// Page size. `None` uses the registry default.
    pub limit: Option<usize>,
    /// Records to skip.
    #[serde(default)]
    pub offset: usize,
}

impl SearchFilter {
    /// Tags every matching record must carry.
    #[must_use]
    pub fn required_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        if let Some(t) = self.vulnerability_type.as_deref() {
            tags.push(type_tag(t));
        }
        if let Some(l) = self.language.as_deref() {
            tags.push(language_tag(l));
        }
        if let Some(f) = self.framework.as_deref() {
            tags.push(framework_tag(f));
        }
        if let Some(v) = self.attack_vector.as_deref() {
            tags.push(attack_vector_tag(v));
        }
        if let Some(a) = self.auditor_id.as_deref() {
            tags.push(auditor_tag(a));
        }
        if let Some(paid) = self.bounty_paid {
            tags.push(bounty_tag(paid));
        }
        tags
    }

    /// Evaluate every predicate against `record`.
    #[must_use]
    pub fn matches(&self, record: &VulnerabilityRecord) -> bool {
        let meta = &record.metadata;
        self.min_risk_score.map_or(true, |min| record.risk_score >= min)
            && self.max_risk_score.map_or(true, |max| record.risk_score <= max)
            && eq_opt(self.vulnerability_type.as_deref(), Some(&record.vulnerability_type))
            && eq_opt(self.language.as_deref(), meta.language.as_ref())
            && eq_opt(self.framework.as_deref(), meta.framework.as_ref())
            && eq_opt(self.attack_vector.as_deref(), meta.attack_vector.as_ref())
            && self
                .discovered_after
                .map_or(true, |after| record.discovered_at >= after)
            && self
                .discovered_before
                .map_or(true, |before| record.discovered_at <= before)
            && self
                .auditor_id
                .as_deref()
                .map_or(true, |a| a == record.auditor_id)
            && self.bounty_paid.map_or(true, |paid| paid == record.bounty_paid)
    }
}

fn eq_opt(wanted: Option<&str>, actual: Option<&String>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(w), Some(a)) => normalize(w) == normalize(a),
        (Some(_), None) => false,
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Matching records, newest verification first.
    pub records: Vec<VulnerabilityRecord>,
    /// Matches before pagination.
    pub total_count: usize,
    /// More matches exist past this page.
    pub has_more: bool,
}
