//! Idempotency ledger: the single source of truth for "already paid".
//!
//! Reads go through a TTL cache of committed records. Only positive lookups
//! are cached, so a cold or stale cache can delay nothing but a cache hit;
//! it can never make an unpaid proof look paid or the reverse.

use crate::cache::{CacheStats, TtlCache};
use crate::error::{Error, Result};
use crate::store::DurableStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// A completed payout. Written once per proof id and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecord {
    /// Idempotency key.
    pub proof_id: String,
    /// Recipient of the bounty.
    pub auditor_id: String,
    /// Amount paid, in token units.
    pub bounty_amount: u64,
    /// Network transaction that moved the funds.
    pub transaction_id: String,
    /// When the ledger write happened.
    pub committed_at: DateTime<Utc>,
    /// Risk score the amount was derived from.
    pub risk_score: u32,
}

/// Result of a ledger commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The record is now the proof's payout.
    Committed,
    /// Another payout for the proof won the insert.
    Conflict {
        /// The record that is already stored, if it could be read back.
        existing: Option<PayoutRecord>,
    },
}

/// Payout history of one auditor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutHistory {
    /// Payouts, newest first.
    pub payouts: Vec<PayoutRecord>,
    /// Sum of all bounty amounts.
    pub total_earnings: u64,
    /// Number of payouts.
    pub total_payouts: usize,
}

/// Pre-flight answer for a proof id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutValidation {
    /// A payout is already recorded.
    pub already_paid: bool,
    /// The recorded payout, if any.
    pub payout_record: Option<PayoutRecord>,
    /// Settlement may be attempted.
    pub can_proceed: bool,
}

/// Cache-assisted view over the payout store.
#[derive(Clone)]
pub struct IdempotencyLedger {
    store: Arc<dyn DurableStore<PayoutRecord>>,
    cache: TtlCache<String, PayoutRecord>,
}

fn auditor_tag(auditor_id: &str) -> String {
    format!("auditor:{auditor_id}")
}

impl IdempotencyLedger {
    /// Create a ledger over `store`, caching hits in `cache`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DurableStore<PayoutRecord>>,
        cache: TtlCache<String, PayoutRecord>,
    ) -> Self {
        Self { store, cache }
    }

    /// Find the payout for `proof_id`. A cache miss always falls through to
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn lookup(&self, proof_id: &str) -> Result<Option<PayoutRecord>> {
        let key = proof_id.to_string();
        if let Some(record) = self.cache.get(&key) {
            debug!(proof_id, "Payout found in ledger cache");
            return Ok(Some(record));
        }

        let record = self.store.get(proof_id).await?;
        if let Some(ref record) = record {
            self.cache.insert(key, record.clone());
        }
        Ok(record)
    }

    /// Record a payout with a unique-key insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails for any reason other than
    /// the key being taken.
    pub async fn commit(&self, record: PayoutRecord) -> Result<CommitOutcome> {
        let tags = vec![auditor_tag(&record.auditor_id)];
        match self
            .store
            .insert(&record.proof_id, record.clone(), tags)
            .await
        {
            Ok(()) => {
                self.cache.insert(record.proof_id.clone(), record);
                Ok(CommitOutcome::Committed)
            }
            Err(Error::AlreadyExists { .. }) => {
                warn!(proof_id = %record.proof_id, "Concurrent payout already committed");
                let existing = self.lookup(&record.proof_id).await?;
                Ok(CommitOutcome::Conflict { existing })
            }
            Err(e) => Err(e),
        }
    }

    /// All payouts to `auditor_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn history(&self, auditor_id: &str) -> Result<PayoutHistory> {
        let mut payouts = self.store.query(&[auditor_tag(auditor_id)]).await?;
        payouts.retain(|p| p.auditor_id == auditor_id);
        payouts.sort_by(|a, b| b.committed_at.cmp(&a.committed_at));

        let total_earnings = payouts.iter().map(|p| p.bounty_amount).sum();
        Ok(PayoutHistory {
            total_payouts: payouts.len(),
            total_earnings,
            payouts,
        })
    }

    /// Whether `proof_id` can still be settled.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn validate(&self, proof_id: &str) -> Result<PayoutValidation> {
        let record = self.lookup(proof_id).await?;
        Ok(PayoutValidation {
            already_paid: record.is_some(),
            can_proceed: record.is_none(),
            payout_record: record,
        })
    }

    /// Ledger cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
