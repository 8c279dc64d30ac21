//! Aggregates over the registered vulnerability set.

use crate::registry::hashing::normalize;
use crate::registry::record::VulnerabilityRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Histogram buckets, in display order.
pub const RISK_BUCKETS: [&str; 4] = ["90-92", "93-95", "96-98", "99-100"];

/// Histogram bucket of a risk score. Scores below 90 fall in no bucket.
#[must_use]
pub const fn risk_bucket(risk_score: u32) -> Option<&'static str> {
    match risk_score {
        90..=92 => Some(RISK_BUCKETS[0]),
        93..=95 => Some(RISK_BUCKETS[1]),
        96..=98 => Some(RISK_BUCKETS[2]),
        99..=u32::MAX => Some(RISK_BUCKETS[3]),
        _ => None,
    }
}

/// Registry-wide statistics. Recomputed from scratch, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryStatistics {
    /// Registered vulnerabilities.
    pub total_vulnerabilities: usize,
    /// Of which the bounty has been paid.
    pub total_bounties_paid: usize,
    /// Mean risk score, 0 for an empty registry.
    pub average_risk_score: f64,
    /// Count per vulnerability type, lowercased.
    pub by_type: BTreeMap<String, usize>,
    /// Count per language where known, lowercased.
    pub by_language: BTreeMap<String, usize>,
    /// Count per framework where known, lowercased.
    pub by_framework: BTreeMap<String, usize>,
    /// Count per auditor.
    pub by_auditor: BTreeMap<String, usize>,
    /// Count per risk bucket. Every bucket is present.
    pub risk_distribution: BTreeMap<String, usize>,
    /// When these numbers were computed.
    pub computed_at: DateTime<Utc>,
}

/// Compute statistics over `records`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_statistics(records: &[VulnerabilityRecord]) -> DictionaryStatistics {
    let mut by_type = BTreeMap::new();
    let mut by_language = BTreeMap::new();
    let mut by_framework = BTreeMap::new();
    let mut by_auditor = BTreeMap::new();
    let mut risk_distribution: BTreeMap<String, usize> =
        RISK_BUCKETS.iter().map(|b| ((*b).to_string(), 0)).collect();
    let mut risk_sum: u64 = 0;
    let mut paid = 0;

    for record in records {
        *by_type.entry(normalize(&record.vulnerability_type)).or_insert(0) += 1;
        *by_auditor.entry(record.auditor_id.clone()).or_insert(0) += 1;
        if let Some(language) = &record.metadata.language {
            *by_language.entry(normalize(language)).or_insert(0) += 1;
        }
        if let Some(framework) = &record.metadata.framework {
            *by_framework.entry(normalize(framework)).or_insert(0) += 1;
        }
        if let Some(bucket) = risk_bucket(record.risk_score) {
            *risk_distribution.entry(bucket.to_string()).or_insert(0) += 1;
        }
        if record.bounty_paid {
            paid += 1;
        }
        risk_sum += u64::from(record.risk_score);
    }

    let average_risk_score = if records.is_empty() {
        0.0
    } else {
        risk_sum as f64 / records.len() as f64
    };

    DictionaryStatistics {
        total_vulnerabilities: records.len(),
        total_bounties_paid: paid,
        average_risk_score,
        by_type,
        by_language,
        by_framework,
        by_auditor,
        risk_distribution,
        computed_at: Utc::now(),
    }
}
