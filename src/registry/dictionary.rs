//! The vulnerability registry: dedup, tagging, search and statistics.

use crate::cache::{CacheStats, TtlCache};
use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::event::{EngineEvent, EngineEventsSender};
use crate::registry::duplicate::{DuplicateCheck, DuplicateChecker};
use crate::registry::hashing::{generate_tags, hash_exploit, ExploitHash};
use crate::registry::record::{ProofData, SearchFilter, SearchResult, VulnerabilityRecord};
use crate::registry::stats::{compute_statistics, DictionaryStatistics};
use crate::store::DurableStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const STATISTICS_KEY: &str = "statistics";

/// Cache statistics of the registry's caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RegistryCacheStats {
    /// Exploit hash lookups.
    pub duplicates: CacheStats,
    /// Search result pages.
    pub search: CacheStats,
    /// Aggregate statistics.
    pub statistics: CacheStats,
}

/// Dedup and search over verified vulnerabilities.
pub struct VulnerabilityRegistry {
    store: Arc<dyn DurableStore<VulnerabilityRecord>>,
    duplicates: DuplicateChecker,
    search_cache: TtlCache<String, SearchResult>,
    statistics_cache: TtlCache<&'static str, DictionaryStatistics>,
    default_search_limit: usize,
    // Serializes check-then-write sequences against the store.
    writes: Mutex<()>,
    events: EngineEventsSender,
}

impl VulnerabilityRegistry {
    /// Create a registry over `store`.
    #[must_use]
    pub fn new(
        config: &RegistryConfig,
        store: Arc<dyn DurableStore<VulnerabilityRecord>>,
        events: EngineEventsSender,
    ) -> Self {
        let known = TtlCache::with_capacity(
            config.cache_capacity,
            Duration::from_secs(config.duplicate_cache_ttl_secs),
        );
        Self {
            duplicates: DuplicateChecker::new(Arc::clone(&store), known),
            store,
            search_cache: TtlCache::with_capacity(
                config.cache_capacity,
                Duration::from_secs(config.search_cache_ttl_secs),
            ),
            statistics_cache: TtlCache::with_capacity(
                1,
                Duration::from_secs(config.statistics_cache_ttl_secs),
            ),
            default_search_limit: config.default_search_limit.max(1),
            writes: Mutex::new(()),
            events,
        }
    }

    /// Register a verified vulnerability, returning its storage id.
    ///
    /// The exploit is hashed first and dropped; nothing downstream sees it.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateVulnerability`] if the exploit is already
    ///   registered. Nothing is written in that case.
    /// - [`Error::AlreadyExists`] if the proof id is already registered.
    /// - [`Error::InvalidInput`] for empty identifiers.
    /// - Store errors.
    pub async fn add_verified_vulnerability(&self, proof: ProofData) -> Result<String> {
        let ProofData {
            proof_id,
            exploit,
            risk_score,
            vulnerability_type,
            affected_projects,
            discovered_at,
            verified_at,
            auditor_id,
            metadata,
        } = proof;
        let exploit_hash = hash_exploit(exploit);

        if proof_id.trim().is_empty() {
            return Err(Error::InvalidInput("proof id is empty".to_string()));
        }
        if auditor_id.trim().is_empty() {
            return Err(Error::InvalidInput("auditor id is empty".to_string()));
        }
        if vulnerability_type.trim().is_empty() {
            return Err(Error::InvalidInput("vulnerability type is empty".to_string()));
        }

        let _guard = self.writes.lock().await;

        let check = self.duplicates.check(&exploit_hash).await?;
        if let Some(existing_proof_id) = check.existing_proof_id {
            warn!(
                proof_id = %proof_id,
                %exploit_hash,
                existing_proof_id = %existing_proof_id,
                "Duplicate vulnerability rejected"
            );
            let _ = self.events.send(EngineEvent::DuplicateRejected {
                exploit_hash: exploit_hash.to_string(),
                existing_proof_id: existing_proof_id.clone(),
            });
            return Err(Error::DuplicateVulnerability { existing_proof_id });
        }

        let record = VulnerabilityRecord {
            proof_id: proof_id.clone(),
            exploit_hash: exploit_hash.clone(),
            risk_score,
            vulnerability_type,
            affected_projects,
            discovered_at,
            verified_at: verified_at.unwrap_or_else(Utc::now),
            auditor_id,
            bounty_paid: false,
            metadata,
        };
        let tags = generate_tags(&record);
        debug!(proof_id = %proof_id, tags = tags.len(), "Persisting vulnerability");
        self.store.insert(&proof_id, record, tags).await?;

        self.duplicates.remember(exploit_hash.clone(), proof_id.clone());
        self.invalidate_derived();

        info!(proof_id = %proof_id, %exploit_hash, risk_score, "Vulnerability registered");
        let _ = self.events.send(EngineEvent::VulnerabilityRegistered {
            proof_id: proof_id.clone(),
            exploit_hash: exploit_hash.to_string(),
        });
        Ok(proof_id)
    }

    /// Whether `hash` is already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn check_duplicate(&self, hash: &ExploitHash) -> Result<DuplicateCheck> {
        self.duplicates.check(hash).await
    }

    /// Search registered vulnerabilities, newest verification first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn search_vulnerabilities(&self, filter: &SearchFilter) -> Result<SearchResult> {
        let key = serde_json::to_string(filter)?;
        if let Some(result) = self.search_cache.get(&key) {
            debug!("Search served from cache");
            return Ok(result);
        }

        let mut matches = self.store.query(&filter.required_tags()).await?;
        matches.retain(|r| filter.matches(r));
        matches.sort_by(|a, b| {
            b.verified_at
                .cmp(&a.verified_at)
                .then_with(|| a.proof_id.cmp(&b.proof_id))
        });

        let total_count = matches.len();
        let limit = filter.limit.unwrap_or(self.default_search_limit);
        let records: Vec<VulnerabilityRecord> =
            matches.into_iter().skip(filter.offset).take(limit).collect();
        let has_more = filter.offset.saturating_add(records.len()) < total_count;

        let result = SearchResult {
            records,
            total_count,
            has_more,
        };
        debug!(total_count, returned = result.records.len(), "Search completed");
        self.search_cache.insert(key, result.clone());
        Ok(result)
    }

    /// Registry-wide statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn get_statistics(&self) -> Result<DictionaryStatistics> {
        if let Some(stats) = self.statistics_cache.get(&STATISTICS_KEY) {
            return Ok(stats);
        }

        let records = self.store.query(&[]).await?;
        let stats = compute_statistics(&records);
        debug!(total = stats.total_vulnerabilities, "Statistics recomputed");
        self.statistics_cache.insert(STATISTICS_KEY, stats.clone());
        Ok(stats)
    }

    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn get_vulnerability(&self, proof_id: &str) -> Result<Option<VulnerabilityRecord>> {
        self.store.get(proof_id).await
    }

    /// Set `bounty_paid` on a record. Returns `false` if no record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read or write fails.
    pub async fn mark_bounty_paid(&self, proof_id: &str) -> Result<bool> {
        let _guard = self.writes.lock().await;

        let Some(mut record) = self.store.get(proof_id).await? else {
            debug!(proof_id, "No registered vulnerability to mark paid");
            return Ok(false);
        };
        if record.bounty_paid {
            return Ok(true);
        }

        record.bounty_paid = true;
        let tags = generate_tags(&record);
        self.store.put(proof_id, record, tags).await?;
        self.invalidate_derived();

        info!(proof_id, "Bounty marked paid");
        let _ = self.events.send(EngineEvent::BountyMarkedPaid {
            proof_id: proof_id.to_string(),
        });
        Ok(true)
    }

    /// Statistics of the registry's caches.
    #[must_use]
    pub fn cache_stats(&self) -> RegistryCacheStats {
        RegistryCacheStats {
            duplicates: self.duplicates.cache_stats(),
            search: self.search_cache.stats(),
            statistics: self.statistics_cache.stats(),
        }
    }

    fn invalidate_derived(&self) {
        self.statistics_cache.clear();
        self.search_cache.clear();
    }
}
