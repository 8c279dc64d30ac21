//! Exploit hash → existing record lookup.

use crate::cache::{CacheStats, TtlCache};
use crate::error::Result;
use crate::registry::hashing::{hash_tag, ExploitHash};
use crate::registry::record::VulnerabilityRecord;
use crate::store::DurableStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Whether an exploit hash is already registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheck {
    /// The hash belongs to a registered record.
    pub is_duplicate: bool,
    /// Proof that owns the hash.
    pub existing_proof_id: Option<String>,
}

impl DuplicateCheck {
    fn found(proof_id: String) -> Self {
        Self {
            is_duplicate: true,
            existing_proof_id: Some(proof_id),
        }
    }

    const fn unique() -> Self {
        Self {
            is_duplicate: false,
            existing_proof_id: None,
        }
    }
}

/// Cache-assisted duplicate lookup. The store is authoritative: only hits
/// are cached, so an empty cache costs a store query and nothing else.
#[derive(Clone)]
pub struct DuplicateChecker {
    store: Arc<dyn DurableStore<VulnerabilityRecord>>,
    known: TtlCache<ExploitHash, String>,
}

impl DuplicateChecker {
    /// Create a checker over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DurableStore<VulnerabilityRecord>>,
        known: TtlCache<ExploitHash, String>,
    ) -> Self {
        Self { store, known }
    }

    /// Look up `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn check(&self, hash: &ExploitHash) -> Result<DuplicateCheck> {
        if let Some(proof_id) = self.known.get(hash) {
            debug!(exploit_hash = %hash, "Duplicate found in cache");
            return Ok(DuplicateCheck::found(proof_id));
        }

        let existing = self
            .store
            .query(&[hash_tag(hash)])
            .await?
            .into_iter()
            .find(|r| &r.exploit_hash == hash);

        Ok(match existing {
            Some(record) => {
                self.known.insert(hash.clone(), record.proof_id.clone());
                DuplicateCheck::found(record.proof_id)
            }
            None => DuplicateCheck::unique(),
        })
    }

    /// Record a freshly registered hash.
    pub fn remember(&self, hash: ExploitHash, proof_id: String) {
        self.known.insert(hash, proof_id);
    }

    /// Cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.known.stats()
    }
}
