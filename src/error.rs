//! Error types for bounty-settlement.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bounty-settlement.
///
/// Expected settlement outcomes (already paid, rate limited, insufficient
/// balance, ...) are not errors; they are reported through
/// [`crate::payout::PayoutResult`]. These variants cover failures of the
/// collaborators and genuinely unexpected conditions.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Durable store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Payment network failure.
    #[error("network error: {0}")]
    Network(String),

    /// Proof verification service failure.
    #[error("verification error: {0}")]
    Verification(String),

    /// Transfer submission failed after all attempts.
    #[error("submission failed: {0}")]
    Submission(String),

    /// An external call did not complete in time.
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// Name of the external call.
        operation: &'static str,
        /// Timeout that elapsed.
        millis: u64,
    },

    /// The exploit content is already registered.
    #[error("duplicate vulnerability: already registered under proof {existing_proof_id}")]
    DuplicateVulnerability {
        /// Proof id of the record that owns the exploit hash.
        existing_proof_id: String,
    },

    /// A unique-key insert hit an existing key.
    #[error("key already exists: {key}")]
    AlreadyExists {
        /// The conflicting key.
        key: String,
    },

    /// Malformed caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
