//! Vulnerability registry.
//!
//! A verified vulnerability is hashed, checked against the registered
//! hashes, tagged and persisted. Only the hash is ever stored, so the
//! registry can answer "has this exploit been seen" without holding any
//! exploit content.
//!
//! ```text
//! ProofData ──▶ hash_exploit ──▶ DuplicateChecker ──▶ generate_tags ──▶ store.insert
//!                  │                    │                                   │
//!            payload wiped       DuplicateVulnerability            stats/search caches
//!                                                                      invalidated
//! ```

mod dictionary;
mod duplicate;
mod hashing;
mod record;
mod stats;

pub use dictionary::{RegistryCacheStats, VulnerabilityRegistry};
pub use duplicate::{DuplicateCheck, DuplicateChecker};
pub use hashing::{generate_tags, hash_exploit, ExploitHash, ExploitPayload};
pub use record::{ProofData, SearchFilter, SearchResult, VulnerabilityMetadata, VulnerabilityRecord};
pub use stats::{compute_statistics, risk_bucket, DictionaryStatistics, RISK_BUCKETS};
