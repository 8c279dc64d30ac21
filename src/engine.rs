//! Settlement engine: the payout orchestrator and the vulnerability registry
//! behind one handle.

use crate::cache::CacheStats;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, EngineEventsChannel, EngineEventsSender};
use crate::payout::{
    HmacTransferSigner, PaymentNetwork, PayoutCollaborators, PayoutHistory, PayoutOrchestrator,
    PayoutRecord, PayoutResult, PayoutValidation, ProofVerifier, RelayerClient, TransferSigner,
    VerificationResult,
};
use crate::registry::{
    DictionaryStatistics, DuplicateCheck, ExploitHash, ProofData, RegistryCacheStats,
    SearchFilter, SearchResult, VulnerabilityRecord, VulnerabilityRegistry,
};
use crate::store::{DurableStore, JsonFileStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Cache statistics across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    /// Payout ledger lookups.
    pub ledger: CacheStats,
    /// Registry caches.
    pub registry: RegistryCacheStats,
}

/// Builder for a [`SettlementEngine`].
///
/// The proof verifier has no default and must be supplied. Everything else
/// falls back to what the configuration describes: the relayer HTTP client,
/// an HMAC signer keyed by `network.signing_key_hex`, and JSON file stores
/// under `storage.data_dir`.
pub struct EngineBuilder {
    config: EngineConfig,
    verifier: Option<Arc<dyn ProofVerifier>>,
    network: Option<Arc<dyn PaymentNetwork>>,
    signer: Option<Arc<dyn TransferSigner>>,
    ledger_store: Option<Arc<dyn DurableStore<PayoutRecord>>>,
    registry_store: Option<Arc<dyn DurableStore<VulnerabilityRecord>>>,
}

impl EngineBuilder {
    /// Create a builder with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            verifier: None,
            network: None,
            signer: None,
            ledger_store: None,
            registry_store: None,
        }
    }

    /// Use `verifier` for proof re-verification.
    #[must_use]
    pub fn verifier(mut self, verifier: Arc<dyn ProofVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Use `network` instead of the relayer client.
    #[must_use]
    pub fn payment_network(mut self, network: Arc<dyn PaymentNetwork>) -> Self {
        self.network = Some(network);
        self
    }

    /// Use `signer` instead of the configured HMAC key.
    #[must_use]
    pub fn signer(mut self, signer: Arc<dyn TransferSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Use `store` for the payout ledger.
    #[must_use]
    pub fn ledger_store(mut self, store: Arc<dyn DurableStore<PayoutRecord>>) -> Self {
        self.ledger_store = Some(store);
        self
    }

    /// Use `store` for the vulnerability registry.
    #[must_use]
    pub fn registry_store(mut self, store: Arc<dyn DurableStore<VulnerabilityRecord>>) -> Self {
        self.registry_store = Some(store);
        self
    }

    /// Validate the configuration and wire the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or a
    /// required collaborator is missing, or a store error if a file store
    /// cannot be opened.
    pub async fn build(self) -> Result<SettlementEngine> {
        let problems = self.config.validate();
        if !problems.is_empty() {
            return Err(Error::Config(problems.join("; ")));
        }

        let verifier = self
            .verifier
            .ok_or_else(|| Error::Config("no proof verifier supplied".to_string()))?;

        let network: Arc<dyn PaymentNetwork> = match self.network {
            Some(network) => network,
            None => Arc::new(RelayerClient::new(
                &self.config.network,
                self.config.payout.submission_timeout(),
            )?),
        };

        let signer: Arc<dyn TransferSigner> = match self.signer {
            Some(signer) => signer,
            None => Arc::new(HmacTransferSigner::from_hex(
                &self.config.network.signing_key_hex,
            )?),
        };

        let ledger_store: Arc<dyn DurableStore<PayoutRecord>> = match self.ledger_store {
            Some(store) => store,
            None => Arc::new(JsonFileStore::open(self.config.ledger_path()).await?),
        };

        let registry_store: Arc<dyn DurableStore<VulnerabilityRecord>> =
            match self.registry_store {
                Some(store) => store,
                None => Arc::new(JsonFileStore::open(self.config.registry_path()).await?),
            };

        let (events_tx, _) = create_event_channel();

        let payouts = PayoutOrchestrator::new(
            &self.config.payout,
            self.config.network.chain_id,
            PayoutCollaborators {
                verifier,
                network,
                signer,
                ledger_store,
            },
            events_tx.clone(),
        );
        let registry =
            VulnerabilityRegistry::new(&self.config.registry, registry_store, events_tx.clone());

        info!(
            "Settlement engine ready (chain_id={}, treasury={})",
            self.config.network.chain_id, self.config.payout.treasury_wallet
        );

        Ok(SettlementEngine {
            config: self.config,
            payouts,
            registry,
            events_tx,
        })
    }
}

/// Handle over the payout orchestrator and the vulnerability registry.
pub struct SettlementEngine {
    config: EngineConfig,
    payouts: PayoutOrchestrator,
    registry: VulnerabilityRegistry,
    events_tx: EngineEventsSender,
}

impl SettlementEngine {
    /// Settle a verified proof. A committed payout also marks the proof's
    /// registered vulnerability as paid.
    ///
    /// # Errors
    ///
    /// Returns an error only if the payout ledger fails; business outcomes
    /// are reported in the [`PayoutResult`].
    pub async fn trigger_bounty_payout(&self, request: &VerificationResult) -> Result<PayoutResult> {
        let result = self.payouts.trigger_bounty_payout(request).await?;

        if result.success {
            match self.registry.mark_bounty_paid(&request.proof_id).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(proof_id = %request.proof_id, "Paid proof has no registered vulnerability");
                }
                Err(e) => {
                    // The ledger is authoritative; the flag is informational
                    warn!(proof_id = %request.proof_id, "Failed to mark bounty paid: {e}");
                }
            }
        }

        Ok(result)
    }

    /// Register a verified vulnerability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateVulnerability`] if the exploit is already
    /// registered, or a store error.
    pub async fn add_verified_vulnerability(&self, proof: ProofData) -> Result<String> {
        self.registry.add_verified_vulnerability(proof).await
    }

    /// Search registered vulnerabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry store fails.
    pub async fn search_vulnerabilities(&self, filter: &SearchFilter) -> Result<SearchResult> {
        self.registry.search_vulnerabilities(filter).await
    }

    /// Whether an exploit hash is already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry store fails.
    pub async fn check_duplicate(&self, hash: &ExploitHash) -> Result<DuplicateCheck> {
        self.registry.check_duplicate(hash).await
    }

    /// Payouts received by an auditor.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger store fails.
    pub async fn get_payout_history(&self, auditor_id: &str) -> Result<PayoutHistory> {
        self.payouts.get_payout_history(auditor_id).await
    }

    /// Whether a proof has been paid.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger store fails.
    pub async fn validate_payout(&self, proof_id: &str) -> Result<PayoutValidation> {
        self.payouts.validate_payout(proof_id).await
    }

    /// Registry-wide statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry store fails.
    pub async fn get_statistics(&self) -> Result<DictionaryStatistics> {
        self.registry.get_statistics().await
    }

    /// Cache statistics of every engine cache.
    #[must_use]
    pub fn cache_report(&self) -> CacheReport {
        CacheReport {
            ledger: self.payouts.ledger().cache_stats(),
            registry: self.registry.cache_stats(),
        }
    }

    /// Subscribe to engine events.
    #[must_use]
    pub fn subscribe_events(&self) -> EngineEventsChannel {
        self.events_tx.subscribe()
    }

    /// The payout orchestrator.
    #[must_use]
    pub fn payouts(&self) -> &PayoutOrchestrator {
        &self.payouts
    }

    /// The vulnerability registry.
    #[must_use]
    pub fn registry(&self) -> &VulnerabilityRegistry {
        &self.registry
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
