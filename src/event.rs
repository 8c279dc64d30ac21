//! Engine event system.

use crate::payout::SettlementStage;
use tokio::sync::broadcast;

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A payout was written to the ledger.
    PayoutCommitted {
        /// Settled proof.
        proof_id: String,
        /// Paid auditor.
        auditor_id: String,
        /// Amount paid.
        amount: u64,
        /// Network transaction id.
        transaction_id: String,
    },

    /// A settlement attempt ended without a payout.
    PayoutRejected {
        /// Proof that was not paid.
        proof_id: String,
        /// Stage at which the attempt stopped.
        stage: SettlementStage,
        /// Human-readable reason.
        reason: String,
    },

    /// A new vulnerability was registered.
    VulnerabilityRegistered {
        /// Owning proof.
        proof_id: String,
        /// Digest of the exploit content.
        exploit_hash: String,
    },

    /// A registration was refused because the exploit is already known.
    DuplicateRejected {
        /// Digest of the exploit content.
        exploit_hash: String,
        /// Proof that already owns the digest.
        existing_proof_id: String,
    },

    /// A registered vulnerability's bounty was marked paid.
    BountyMarkedPaid {
        /// Proof whose record changed.
        proof_id: String,
    },
}

/// Channel for receiving engine events.
pub type EngineEventsChannel = broadcast::Receiver<EngineEvent>;

/// Sender for engine events.
pub type EngineEventsSender = broadcast::Sender<EngineEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (EngineEventsSender, EngineEventsChannel) {
    broadcast::channel(256)
}
