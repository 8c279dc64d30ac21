//! Builds, signs and submits bounty transfers.

use crate::error::{Error, Result};
use crate::payout::network::{
    PaymentNetwork, SignedTransfer, TransactionReceipt, TransferRequest, TransferSigner,
};
use crate::payout::retry::{with_timeout, RetryPolicy};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What to pay, to whom, for which proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOrder {
    /// Receiving wallet.
    pub recipient: String,
    /// Amount in token units.
    pub amount: u64,
    /// Proof being settled.
    pub proof_id: String,
    /// Context forwarded to the network.
    pub metadata: BTreeMap<String, String>,
}

/// Treasury-side transfer settings.
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// Paying wallet.
    pub treasury_wallet: String,
    /// Token contract.
    pub token_address: String,
    /// Target chain.
    pub chain_id: u64,
    /// Timeout per submission attempt.
    pub attempt_timeout: Duration,
}

/// Wraps one external call per attempt: build payload, sign, submit.
///
/// The submitter cannot deduplicate at the network layer. Callers must
/// consult the payout ledger before calling [`TransactionSubmitter::submit`].
pub struct TransactionSubmitter {
    network: Arc<dyn PaymentNetwork>,
    signer: Arc<dyn TransferSigner>,
    retry: RetryPolicy,
    config: SubmitterConfig,
}

impl TransactionSubmitter {
    /// Create a new submitter.
    #[must_use]
    pub fn new(
        network: Arc<dyn PaymentNetwork>,
        signer: Arc<dyn TransferSigner>,
        retry: RetryPolicy,
        config: SubmitterConfig,
    ) -> Self {
        Self {
            network,
            signer,
            retry,
            config,
        }
    }

    /// Build the payload for one attempt. Every call yields a fresh nonce.
    #[must_use]
    pub fn build_request(&self, order: &TransferOrder) -> TransferRequest {
        TransferRequest {
            from: self.config.treasury_wallet.clone(),
            to: order.recipient.clone(),
            amount: order.amount,
            token_address: self.config.token_address.clone(),
            chain_id: self.config.chain_id,
            proof_id: order.proof_id.clone(),
            nonce: uuid::Uuid::new_v4().to_string(),
            metadata: order.metadata.clone(),
        }
    }

    /// Submit once, without retry.
    ///
    /// # Errors
    ///
    /// Returns an error if signing or submission fails or times out.
    pub async fn submit_once(&self, order: &TransferOrder) -> Result<TransactionReceipt> {
        let request = self.build_request(order);
        let signature = self.signer.sign(&request)?;
        let transfer = SignedTransfer { request, signature };

        with_timeout(
            "transfer_submission",
            self.config.attempt_timeout,
            self.network.submit_transfer(&transfer),
        )
        .await
    }

    /// Submit with the configured retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Submission`] carrying the last attempt's error once
    /// the attempt bound is exhausted.
    pub async fn submit(&self, order: &TransferOrder) -> Result<TransactionReceipt> {
        debug!(
            proof_id = %order.proof_id,
            recipient = %order.recipient,
            amount = order.amount,
            "Submitting bounty transfer"
        );

        let receipt = self
            .retry
            .run("transfer_submission", |_attempt| self.submit_once(order))
            .await
            .map_err(|e| match e {
                Error::Submission(_) => e,
                other => Error::Submission(other.to_string()),
            })?;

        info!(
            proof_id = %order.proof_id,
            transaction_id = %receipt.transaction_id,
            "Transfer accepted by payment network"
        );
        Ok(receipt)
    }

    /// Retry policy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}
