//! # bounty-settlement
//!
//! Settles security bounties exactly once and keeps a deduplicated registry
//! of verified vulnerabilities.
//!
//! ## Overview
//!
//! Two halves share a cache primitive, a durable store interface and an
//! event channel:
//!
//! - **Payout orchestration**: a verified proof is re-verified, checked
//!   against the payout ledger, rate limited per auditor, priced by risk
//!   tier, checked against the treasury balance, submitted with bounded
//!   retry and finally committed to the ledger with a unique-key insert.
//! - **Vulnerability registry**: a verified exploit is reduced to its
//!   SHA-256 hash, rejected if the hash is already known, tagged and
//!   persisted. Search and statistics run over the stored records.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bounty_settlement::{EngineBuilder, EngineConfig, VerificationResult};
//!
//! let engine = EngineBuilder::new(EngineConfig::from_file(path)?)
//!     .verifier(verifier)
//!     .build()
//!     .await?;
//!
//! let result = engine.trigger_bounty_payout(&VerificationResult {
//!     proof_id: "p1".into(),
//!     auditor_id: "a1".into(),
//!     risk_score: 97,
//!     metadata: Default::default(),
//! }).await?;
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod payout;
pub mod registry;
pub mod store;

pub use cache::{CacheStats, EvictionPolicy, TtlCache};
pub use config::EngineConfig;
pub use engine::{CacheReport, EngineBuilder, SettlementEngine};
pub use error::{Error, Result};
pub use event::{EngineEvent, EngineEventsChannel};
pub use payout::{
    calculate_bounty, PayoutFailure, PayoutHistory, PayoutRecord, PayoutResult, PayoutValidation,
    VerificationResult,
};
pub use registry::{
    DictionaryStatistics, ExploitHash, ExploitPayload, ProofData, SearchFilter, SearchResult,
    VulnerabilityRecord,
};
