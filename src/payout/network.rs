//! Payment network port and its HTTP relayer adapter.
//!
//! Transfers are gasless: the treasury signs a transfer payload and a relayer
//! submits it on chain. The network offers no deduplication, so every call
//! here may move funds; exactly-once is enforced by the payout ledger.

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Transfer payload, serialized canonically before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Paying wallet (treasury).
    pub from: String,
    /// Receiving wallet (auditor).
    pub to: String,
    /// Amount in token units.
    pub amount: u64,
    /// Token contract.
    pub token_address: String,
    /// Target chain.
    pub chain_id: u64,
    /// Proof being settled.
    pub proof_id: String,
    /// Fresh per attempt.
    pub nonce: String,
    /// Free-form context forwarded to the relayer.
    pub metadata: BTreeMap<String, String>,
}

/// A transfer with its signature attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransfer {
    /// The signed payload.
    pub request: TransferRequest,
    /// Hex-encoded signature over the canonical payload.
    pub signature: String,
}

/// Receipt returned by the network for an accepted transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Network transaction identifier.
    pub transaction_id: String,
}

/// The payment network as seen by the payout engine.
#[async_trait]
pub trait PaymentNetwork: Send + Sync {
    /// Current token balance of `wallet`.
    async fn balance(&self, wallet: &str) -> Result<u64>;

    /// Submit a signed transfer. Each call is a new submission.
    async fn submit_transfer(&self, transfer: &SignedTransfer) -> Result<TransactionReceipt>;
}

/// Signs transfer payloads.
pub trait TransferSigner: Send + Sync {
    /// Produce a hex-encoded signature over the canonical request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be serialized or signed.
    fn sign(&self, request: &TransferRequest) -> Result<String>;
}

/// HMAC-SHA256 signer keyed by the relayer credential.
pub struct HmacTransferSigner {
    key: Vec<u8>,
}

impl HmacTransferSigner {
    /// Create a signer from raw key bytes.
    #[must_use]
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Create a signer from a hex-encoded key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or not valid hex.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        if key_hex.is_empty() {
            return Err(Error::Config("signing key is not set".to_string()));
        }
        let key = hex::decode(key_hex)
            .map_err(|e| Error::Config(format!("signing key is not valid hex: {e}")))?;
        Ok(Self::new(key))
    }

    /// Check a signature produced by this signer.
    #[must_use]
    pub fn verify(&self, transfer: &SignedTransfer) -> bool {
        let Ok(signature) = hex::decode(&transfer.signature) else {
            return false;
        };
        let Ok(payload) = serde_json::to_vec(&transfer.request) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(&payload);
        mac.verify_slice(&signature).is_ok()
    }
}

impl TransferSigner for HmacTransferSigner {
    fn sign(&self, request: &TransferRequest) -> Result<String> {
        let payload = serde_json::to_vec(request)?;
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::Config(format!("invalid signing key: {e}")))?;
        mac.update(&payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for HmacTransferSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HmacTransferSigner(***)")
    }
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: u64,
}

/// [`PaymentNetwork`] over the relayer's HTTP API.
///
/// - `GET {base}/balance/{wallet}` → `{"balance": u64}`
/// - `POST {base}/transfer` with a [`SignedTransfer`] → `{"transactionId": "..."}`
#[derive(Debug, Clone)]
pub struct RelayerClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayerClient {
    /// Create a client for the configured relayer.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &NetworkConfig, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.relayer_url.trim_end_matches('/').to_string(),
        })
    }

    /// Relayer base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PaymentNetwork for RelayerClient {
    async fn balance(&self, wallet: &str) -> Result<u64> {
        let url = format!("{}/balance/{wallet}", self.base_url);
        debug!("Querying treasury balance from {url}");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Network(format!("balance query failed: {e}")))?;

        let body: BalanceResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("malformed balance response: {e}")))?;
        Ok(body.balance)
    }

    async fn submit_transfer(&self, transfer: &SignedTransfer) -> Result<TransactionReceipt> {
        let url = format!("{}/transfer", self.base_url);
        debug!(
            proof_id = %transfer.request.proof_id,
            nonce = %transfer.request.nonce,
            "Submitting transfer to {url}"
        );

        let response = self
            .http
            .post(&url)
            .json(transfer)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Network(format!("transfer submission failed: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| Error::Network(format!("malformed transfer response: {e}")))
    }
}
