//! Proof verification port.
//!
//! Verification itself (zero-knowledge proof checking) happens elsewhere;
//! the payout engine only consumes its verdict.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Verdict reported by the verification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    /// The proof checks out.
    pub is_valid: bool,
    /// The proven vulnerability qualifies for a bounty.
    pub is_high_severity: bool,
}

impl VerificationOutcome {
    /// Both conditions required for settlement hold.
    #[must_use]
    pub fn is_payable(&self) -> bool {
        self.is_valid && self.is_high_severity
    }

    /// Human-readable reason the proof is not payable, if any.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&'static str> {
        match (self.is_valid, self.is_high_severity) {
            (true, true) => None,
            (false, _) => Some("proof is not valid"),
            (true, false) => Some("proof is not high severity"),
        }
    }
}

/// The proof verification service.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    /// Re-check a proof on behalf of `auditor_id`.
    async fn verify(&self, proof_id: &str, auditor_id: &str) -> Result<VerificationOutcome>;
}
