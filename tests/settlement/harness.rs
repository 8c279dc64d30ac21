//! Scripted collaborators and an engine wired to in-memory stores.

use async_trait::async_trait;
use bounty_settlement::config::EngineConfig;
use bounty_settlement::payout::{
    HmacTransferSigner, PaymentNetwork, PayoutRecord, ProofVerifier, SignedTransfer,
    TransactionReceipt, VerificationOutcome,
};
use bounty_settlement::registry::{
    ExploitPayload, ProofData, VulnerabilityMetadata, VulnerabilityRecord,
};
use bounty_settlement::store::MemoryStore;
use bounty_settlement::{EngineBuilder, Error, Result, SettlementEngine, VerificationResult};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Signing key shared by the engine and the assertions.
pub const SIGNING_KEY: &[u8] = b"settlement-test-key";

/// Verifier answering from a script; unscripted proofs are valid and
/// high severity.
#[derive(Default)]
pub struct ScriptedVerifier {
    outcomes: Mutex<HashMap<String, VerificationOutcome>>,
    unavailable: Mutex<bool>,
}

impl ScriptedVerifier {
    /// Answer `outcome` for `proof_id`.
    pub fn script(&self, proof_id: &str, outcome: VerificationOutcome) {
        self.outcomes.lock().insert(proof_id.to_string(), outcome);
    }

    /// Make every call fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }
}

#[async_trait]
impl ProofVerifier for ScriptedVerifier {
    async fn verify(&self, proof_id: &str, _auditor_id: &str) -> Result<VerificationOutcome> {
        // Let concurrent settlements interleave here
        tokio::task::yield_now().await;
        if *self.unavailable.lock() {
            return Err(Error::Verification("verifier offline".to_string()));
        }
        Ok(self
            .outcomes
            .lock()
            .get(proof_id)
            .copied()
            .unwrap_or(VerificationOutcome {
                is_valid: true,
                is_high_severity: true,
            }))
    }
}

/// Payment network with a scripted balance and failure budget.
pub struct FakeTreasury {
    balance: Mutex<Option<u64>>,
    failures_left: Mutex<u32>,
    submissions: Mutex<Vec<SignedTransfer>>,
    next_tx: Mutex<u64>,
}

impl FakeTreasury {
    fn new(balance: u64) -> Self {
        Self {
            balance: Mutex::new(Some(balance)),
            failures_left: Mutex::new(0),
            submissions: Mutex::new(Vec::new()),
            next_tx: Mutex::new(1),
        }
    }

    /// Report `balance`, or fail the balance query with `None`.
    pub fn set_balance(&self, balance: Option<u64>) {
        *self.balance.lock() = balance;
    }

    /// Fail the next `count` submissions.
    pub fn fail_next(&self, count: u32) {
        *self.failures_left.lock() = count;
    }

    /// Every transfer the network has seen, accepted or not.
    pub fn submissions(&self) -> Vec<SignedTransfer> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl PaymentNetwork for FakeTreasury {
    async fn balance(&self, _wallet: &str) -> Result<u64> {
        let balance = *self.balance.lock();
        balance.ok_or_else(|| Error::Network("balance rpc unavailable".to_string()))
    }

    async fn submit_transfer(&self, transfer: &SignedTransfer) -> Result<TransactionReceipt> {
        tokio::task::yield_now().await;
        self.submissions.lock().push(transfer.clone());

        let mut failures = self.failures_left.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(Error::Network("relayer returned 503".to_string()));
        }
        drop(failures);

        let mut next = self.next_tx.lock();
        let transaction_id = format!("0x{:064x}", *next);
        *next += 1;
        Ok(TransactionReceipt { transaction_id })
    }
}

/// An engine over in-memory stores and scripted collaborators.
pub struct TestHarness {
    pub engine: SettlementEngine,
    pub verifier: Arc<ScriptedVerifier>,
    pub treasury: Arc<FakeTreasury>,
    pub ledger_store: Arc<MemoryStore<PayoutRecord>>,
    pub registry_store: Arc<MemoryStore<VulnerabilityRecord>>,
}

impl TestHarness {
    /// Default configuration with a well-funded treasury.
    pub async fn setup() -> Self {
        Self::setup_with(test_config(), 1_000_000).await
    }

    /// Custom configuration and starting balance.
    pub async fn setup_with(config: EngineConfig, balance: u64) -> Self {
        let verifier = Arc::new(ScriptedVerifier::default());
        let treasury = Arc::new(FakeTreasury::new(balance));
        let ledger_store = Arc::new(MemoryStore::new());
        let registry_store = Arc::new(MemoryStore::new());

        let engine = EngineBuilder::new(config)
            .verifier(verifier.clone())
            .payment_network(treasury.clone())
            .signer(Arc::new(HmacTransferSigner::new(SIGNING_KEY.to_vec())))
            .ledger_store(ledger_store.clone())
            .registry_store(registry_store.clone())
            .build()
            .await
            .expect("engine builds");

        Self {
            engine,
            verifier,
            treasury,
            ledger_store,
            registry_store,
        }
    }
}

/// Valid configuration with fast retries.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.payout.treasury_wallet = "0x00000000000000000000000000000000000000aa".to_string();
    config.payout.token_address = "0x00000000000000000000000000000000000000bb".to_string();
    config.payout.retry.base_delay_ms = 10;
    config
}

/// A settlement request.
pub fn verified(proof_id: &str, auditor_id: &str, risk_score: u32) -> VerificationResult {
    VerificationResult {
        proof_id: proof_id.to_string(),
        auditor_id: auditor_id.to_string(),
        risk_score,
        metadata: BTreeMap::new(),
    }
}

/// A registration request.
pub fn proof(proof_id: &str, exploit: &str, risk_score: u32) -> ProofData {
    ProofData {
        proof_id: proof_id.to_string(),
        exploit: ExploitPayload::new(exploit),
        risk_score,
        vulnerability_type: "reentrancy".to_string(),
        affected_projects: vec!["vault".to_string()],
        discovered_at: Utc::now(),
        verified_at: None,
        auditor_id: "a1".to_string(),
        metadata: VulnerabilityMetadata {
            language: Some("Solidity".to_string()),
            framework: Some("Foundry".to_string()),
            attack_vector: Some("external call".to_string()),
        },
    }
}
