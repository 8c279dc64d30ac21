//! Bounty settlement: turns a verified proof into an exactly-once,
//! rate-limited payment to the discoverer.
//!
//! # Architecture
//!
//! ```text
//! VerificationResult received
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Re-verify proof     │──── invalid / low severity ──▶ Rejected
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Ledger lookup       │──── found ──▶ AlreadyPaid (original tx id)
//! │ (cache, then store) │
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Reserve rate slot   │──── window full ──▶ RateLimited
//! │ (sliding window)    │
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Bounty tier         │──── zero ──▶ NotEligible
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Reserve daily       │──── used up ──▶ DailyCapReached
//! │ allowance (reduce)  │
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Treasury balance    │──── short ──▶ InsufficientBalance
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Sign + submit       │──── bound exhausted ──▶ SubmissionFailed
//! │ (bounded retry)     │
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Unique ledger insert│──── conflict ──▶ AlreadyPaid
//! └─────────┬───────────┘
//!           ▼
//!       Committed (slot and allowance kept)
//! ```
//!
//! Every exit before the commit releases the rate slot and the allowance.

mod balance;
mod bounty;
mod daily_cap;
mod ledger;
mod network;
mod orchestrator;
mod rate_limit;
mod retry;
mod submitter;
mod verifier;

pub use balance::{BalanceDecision, BalanceGuard};
pub use bounty::{calculate_bounty, BountyTier};
pub use daily_cap::{DailyBountyCap, DailyReservation, DEFAULT_DAILY_BOUNTY_CAP};
pub use ledger::{CommitOutcome, IdempotencyLedger, PayoutHistory, PayoutRecord, PayoutValidation};
pub use network::{
    HmacTransferSigner, PaymentNetwork, RelayerClient, SignedTransfer, TransactionReceipt,
    TransferRequest, TransferSigner,
};
pub use orchestrator::{
    PayoutCollaborators, PayoutFailure, PayoutOrchestrator, PayoutResult, SettlementStage,
    VerificationResult,
};
pub use rate_limit::{RateLimiter, RateReservation, DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW};
pub use retry::{with_timeout, Backoff, RetryPolicy};
pub use submitter::{SubmitterConfig, TransactionSubmitter, TransferOrder};
pub use verifier::{ProofVerifier, VerificationOutcome};
