//! Settlement workflow: the only entry point that can trigger a payout.

use crate::cache::TtlCache;
use crate::config::PayoutConfig;
use crate::error::Result;
use crate::event::{EngineEvent, EngineEventsSender};
use crate::payout::balance::{BalanceDecision, BalanceGuard};
use crate::payout::bounty::calculate_bounty;
use crate::payout::daily_cap::DailyBountyCap;
use crate::payout::ledger::{
    CommitOutcome, IdempotencyLedger, PayoutHistory, PayoutRecord, PayoutValidation,
};
use crate::payout::network::{PaymentNetwork, TransferSigner};
use crate::payout::rate_limit::RateLimiter;
use crate::payout::retry::{with_timeout, RetryPolicy};
use crate::payout::submitter::{SubmitterConfig, TransactionSubmitter, TransferOrder};
use crate::payout::verifier::ProofVerifier;
use crate::store::DurableStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A verified proof submitted for settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Idempotency key.
    pub proof_id: String,
    /// Discoverer, also the payout recipient.
    pub auditor_id: String,
    /// Risk score assigned by verification.
    pub risk_score: u32,
    /// Context forwarded with the transfer.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Where a settlement attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStage {
    /// Proof re-verification.
    Verifying,
    /// Ledger lookup for an earlier payout.
    IdempotencyCheck,
    /// Per-auditor rate limit.
    RateCheck,
    /// Risk score to amount.
    BountyCalculation,
    /// Treasury-wide daily allowance.
    DailyCapCheck,
    /// Treasury solvency.
    BalanceChecking,
    /// Transfer submission, including retries.
    Submitting,
    /// Ledger write.
    Committing,
    /// Payout recorded.
    Committed,
}

/// Typed reason a settlement did not pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutFailure {
    /// The proof did not verify as valid and high severity.
    #[error("verification failed: {reason}")]
    VerificationFailed {
        /// Why verification rejected the proof.
        reason: String,
    },
    /// The proof has already been paid.
    #[error("already paid")]
    AlreadyPaid,
    /// The auditor reached the hourly settlement limit.
    #[error("rate limit exceeded: at most {limit} payouts per hour")]
    RateLimitExceeded {
        /// Configured limit.
        limit: u32,
    },
    /// The risk score maps to no reward.
    #[error("risk score {risk_score} is not eligible for a bounty")]
    NotEligible {
        /// Offending risk score.
        risk_score: u32,
    },
    /// Today's payout allowance is used up.
    #[error("daily bounty cap of {cap} tokens reached")]
    DailyCapReached {
        /// Configured cap.
        cap: u64,
    },
    /// The treasury cannot cover the payout.
    #[error("insufficient treasury balance: {balance} < {required}")]
    InsufficientBalance {
        /// Reported balance.
        balance: u64,
        /// Amount needed.
        required: u64,
    },
    /// The balance query failed and the engine fails closed.
    #[error("treasury balance unavailable: {reason}")]
    BalanceUnavailable {
        /// Query error.
        reason: String,
    },
    /// Every submission attempt failed.
    #[error("transaction submission failed: {reason}")]
    SubmissionFailed {
        /// Last attempt's error.
        reason: String,
    },
}

impl PayoutFailure {
    /// Stage that produced this failure.
    #[must_use]
    pub fn stage(&self) -> SettlementStage {
        match self {
            Self::VerificationFailed { .. } => SettlementStage::Verifying,
            Self::AlreadyPaid => SettlementStage::IdempotencyCheck,
            Self::RateLimitExceeded { .. } => SettlementStage::RateCheck,
            Self::NotEligible { .. } => SettlementStage::BountyCalculation,
            Self::DailyCapReached { .. } => SettlementStage::DailyCapCheck,
            Self::InsufficientBalance { .. } | Self::BalanceUnavailable { .. } => {
                SettlementStage::BalanceChecking
            }
            Self::SubmissionFailed { .. } => SettlementStage::Submitting,
        }
    }
}

/// Outcome of [`PayoutOrchestrator::trigger_bounty_payout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutResult {
    /// A payout was committed by this call.
    pub success: bool,
    /// Transaction of this payout, or of the earlier one for `AlreadyPaid`.
    pub transaction_id: Option<String>,
    /// Amount paid or that would have been paid.
    pub bounty_amount: u64,
    /// Auditor receiving the bounty.
    pub recipient: String,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
    /// Human-readable failure reason.
    pub error: Option<String>,
    /// Typed failure reason.
    pub failure: Option<PayoutFailure>,
}

impl PayoutResult {
    fn committed(record: &PayoutRecord) -> Self {
        Self {
            success: true,
            transaction_id: Some(record.transaction_id.clone()),
            bounty_amount: record.bounty_amount,
            recipient: record.auditor_id.clone(),
            timestamp: record.committed_at,
            error: None,
            failure: None,
        }
    }

    fn failed(recipient: &str, bounty_amount: u64, failure: PayoutFailure) -> Self {
        Self {
            success: false,
            transaction_id: None,
            bounty_amount,
            recipient: recipient.to_string(),
            timestamp: Utc::now(),
            error: Some(failure.to_string()),
            failure: Some(failure),
        }
    }
}

/// External collaborators the orchestrator depends on.
#[derive(Clone)]
pub struct PayoutCollaborators {
    /// Proof verification service.
    pub verifier: Arc<dyn ProofVerifier>,
    /// Payment network.
    pub network: Arc<dyn PaymentNetwork>,
    /// Transfer signer.
    pub signer: Arc<dyn TransferSigner>,
    /// Durable payout ledger.
    pub ledger_store: Arc<dyn DurableStore<PayoutRecord>>,
}

/// Composes verification, idempotency, rate limiting, bounty calculation,
/// balance checking and submission into the settlement workflow.
///
/// ```text
/// verify ─▶ ledger lookup ─▶ rate slot ─▶ bounty ─▶ daily cap ─▶ balance ─▶ submit ─▶ ledger insert
///   │            │              │            │           │            │          │            │
/// Rejected   AlreadyPaid   RateLimited  NotEligible  CapReached  Insufficient Failed    Committed
/// ```
///
/// The rate slot and the daily allowance are claimed atomically and held
/// until the ledger insert; any earlier exit hands them back.
pub struct PayoutOrchestrator {
    verifier: Arc<dyn ProofVerifier>,
    ledger: IdempotencyLedger,
    rate_limiter: RateLimiter,
    daily_cap: DailyBountyCap,
    balance: BalanceGuard,
    submitter: TransactionSubmitter,
    max_single_bounty: u64,
    verification_timeout: Duration,
    events: EngineEventsSender,
}

impl PayoutOrchestrator {
    /// Wire the orchestrator from configuration and collaborators.
    #[must_use]
    pub fn new(
        config: &PayoutConfig,
        chain_id: u64,
        collaborators: PayoutCollaborators,
        events: EngineEventsSender,
    ) -> Self {
        let ledger_cache = TtlCache::with_capacity(
            config.ledger_cache_capacity,
            Duration::from_secs(config.ledger_cache_ttl_secs),
        );
        let ledger = IdempotencyLedger::new(collaborators.ledger_store, ledger_cache);

        let balance = BalanceGuard::new(
            Arc::clone(&collaborators.network),
            config.treasury_wallet.clone(),
            config.balance_timeout(),
            config.fail_open_on_balance_error,
        );

        let submitter = TransactionSubmitter::new(
            collaborators.network,
            collaborators.signer,
            RetryPolicy::from_config(&config.retry),
            SubmitterConfig {
                treasury_wallet: config.treasury_wallet.clone(),
                token_address: config.token_address.clone(),
                chain_id,
                attempt_timeout: config.submission_timeout(),
            },
        );

        info!(
            "Payout orchestrator initialized (max_payouts_per_hour={}, daily_bounty_cap={}, max_attempts={}, fail_open_on_balance_error={})",
            config.max_payouts_per_hour,
            config.daily_bounty_cap,
            submitter.retry_policy().max_attempts(),
            config.fail_open_on_balance_error
        );

        Self {
            verifier: collaborators.verifier,
            ledger,
            rate_limiter: RateLimiter::new(config.max_payouts_per_hour),
            daily_cap: DailyBountyCap::new(config.daily_bounty_cap),
            balance,
            submitter,
            max_single_bounty: config.max_single_bounty,
            verification_timeout: config.verification_timeout(),
            events,
        }
    }

    /// Settle a verified proof.
    ///
    /// Business outcomes (rejected, already paid, rate limited, not eligible,
    /// daily cap reached, insufficient funds, submission failure) are reported in the returned
    /// [`PayoutResult`]; none of them leave a ledger record behind.
    ///
    /// # Errors
    ///
    /// Returns an error only if the ledger store fails. A ledger write that
    /// fails after the transfer was accepted is logged with the transaction
    /// id before the error is returned.
    pub async fn trigger_bounty_payout(&self, request: &VerificationResult) -> Result<PayoutResult> {
        let proof_id = request.proof_id.as_str();
        let auditor_id = request.auditor_id.as_str();
        info!(proof_id, auditor_id, risk_score = request.risk_score, "Settlement received");

        // Verifying
        let verification = with_timeout(
            "proof_verification",
            self.verification_timeout,
            self.verifier.verify(proof_id, auditor_id),
        )
        .await;
        let outcome = match verification {
            Ok(outcome) => outcome,
            Err(e) => {
                return Ok(self.reject(
                    request,
                    0,
                    PayoutFailure::VerificationFailed {
                        reason: e.to_string(),
                    },
                ));
            }
        };
        if let Some(reason) = outcome.rejection_reason() {
            return Ok(self.reject(
                request,
                0,
                PayoutFailure::VerificationFailed {
                    reason: reason.to_string(),
                },
            ));
        }

        // Idempotency check: a pure read, never re-triggers payment
        if let Some(existing) = self.ledger.lookup(proof_id).await? {
            return Ok(self.already_paid(request, Some(&existing)));
        }

        let Some(rate_slot) = self.rate_limiter.try_reserve(auditor_id) else {
            return Ok(self.reject(
                request,
                0,
                PayoutFailure::RateLimitExceeded {
                    limit: self.rate_limiter.max_per_window(),
                },
            ));
        };

        let tier_amount = calculate_bounty(request.risk_score);
        if tier_amount == 0 {
            return Ok(self.reject(
                request,
                0,
                PayoutFailure::NotEligible {
                    risk_score: request.risk_score,
                },
            ));
        }
        let capped = tier_amount.min(self.max_single_bounty);
        if capped < tier_amount {
            warn!(proof_id, tier_amount, capped, "Bounty clamped to single payout cap");
        }

        let Some(allowance) = self.daily_cap.try_reserve(capped) else {
            return Ok(self.reject(
                request,
                capped,
                PayoutFailure::DailyCapReached {
                    cap: self.daily_cap.cap(),
                },
            ));
        };
        let amount = allowance.amount();
        if amount < capped {
            warn!(proof_id, capped, amount, "Bounty reduced to fit the daily cap");
        }
        debug!(proof_id, amount, "Bounty calculated");

        match self.balance.check(amount).await {
            Ok(BalanceDecision::Insufficient { balance, required }) => {
                return Ok(self.reject(
                    request,
                    amount,
                    PayoutFailure::InsufficientBalance { balance, required },
                ));
            }
            Ok(BalanceDecision::Sufficient { .. } | BalanceDecision::AssumedSufficient) => {}
            Err(e) => {
                return Ok(self.reject(
                    request,
                    amount,
                    PayoutFailure::BalanceUnavailable {
                        reason: e.to_string(),
                    },
                ));
            }
        }

        let order = TransferOrder {
            recipient: auditor_id.to_string(),
            amount,
            proof_id: proof_id.to_string(),
            metadata: request.metadata.clone(),
        };
        let receipt = match self.submitter.submit(&order).await {
            Ok(receipt) => receipt,
            Err(e) => {
                return Ok(self.reject(
                    request,
                    amount,
                    PayoutFailure::SubmissionFailed {
                        reason: e.to_string(),
                    },
                ));
            }
        };

        let record = PayoutRecord {
            proof_id: proof_id.to_string(),
            auditor_id: auditor_id.to_string(),
            bounty_amount: amount,
            transaction_id: receipt.transaction_id,
            committed_at: Utc::now(),
            risk_score: request.risk_score,
        };

        match self.ledger.commit(record.clone()).await {
            Ok(CommitOutcome::Committed) => {
                rate_slot.confirm();
                allowance.confirm();
            }
            Ok(CommitOutcome::Conflict { existing }) => {
                error!(
                    proof_id,
                    transaction_id = %record.transaction_id,
                    "Lost the ledger insert to a concurrent settlement; transfer needs reconciliation"
                );
                return Ok(self.already_paid(request, existing.as_ref()));
            }
            Err(e) => {
                error!(
                    proof_id,
                    transaction_id = %record.transaction_id,
                    "Transfer accepted but ledger write failed: {e}"
                );
                return Err(e);
            }
        }

        info!(
            proof_id,
            auditor_id,
            amount,
            transaction_id = %record.transaction_id,
            "Payout committed"
        );
        let _ = self.events.send(EngineEvent::PayoutCommitted {
            proof_id: record.proof_id.clone(),
            auditor_id: record.auditor_id.clone(),
            amount,
            transaction_id: record.transaction_id.clone(),
        });

        Ok(PayoutResult::committed(&record))
    }

    /// Whether `proof_id` has been paid and can still be settled.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger store fails.
    pub async fn validate_payout(&self, proof_id: &str) -> Result<PayoutValidation> {
        self.ledger.validate(proof_id).await
    }

    /// Payouts received by `auditor_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger store fails.
    pub async fn get_payout_history(&self, auditor_id: &str) -> Result<PayoutHistory> {
        self.ledger.history(auditor_id).await
    }

    /// The underlying ledger.
    #[must_use]
    pub fn ledger(&self) -> &IdempotencyLedger {
        &self.ledger
    }

    /// The per-auditor rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// The treasury-wide daily allowance.
    #[must_use]
    pub fn daily_cap(&self) -> &DailyBountyCap {
        &self.daily_cap
    }

    fn already_paid(&self, request: &VerificationResult, existing: Option<&PayoutRecord>) -> PayoutResult {
        let mut result = self.reject(
            request,
            existing.map_or(0, |r| r.bounty_amount),
            PayoutFailure::AlreadyPaid,
        );
        result.transaction_id = existing.map(|r| r.transaction_id.clone());
        result
    }

    fn reject(&self, request: &VerificationResult, amount: u64, failure: PayoutFailure) -> PayoutResult {
        let stage = failure.stage();
        let reason = failure.to_string();
        warn!(
            proof_id = %request.proof_id,
            auditor_id = %request.auditor_id,
            ?stage,
            "Settlement stopped: {reason}"
        );
        let _ = self.events.send(EngineEvent::PayoutRejected {
            proof_id: request.proof_id.clone(),
            stage,
            reason,
        });
        PayoutResult::failed(&request.auditor_id, amount, failure)
    }
}
