//! Durable record stores.
//!
//! Both engine halves persist through [`DurableStore`]: the payout ledger
//! stores [`crate::payout::PayoutRecord`]s keyed by proof id, the registry
//! stores [`crate::registry::VulnerabilityRecord`]s keyed by proof id and
//! tagged for search.
//!
//! Queries push down tag matching only. Anything that is not expressible as
//! a required tag (ranges, dates) is filtered by the caller.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A record together with the tags it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry<R> {
    /// The stored record.
    pub record: R,
    /// Search tags attached to the record.
    pub tags: Vec<String>,
}

impl<R> StoredEntry<R> {
    /// Whether every tag in `required` is attached to this entry.
    #[must_use]
    pub fn has_tags(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.tags.contains(tag))
    }
}

/// Key/value store with tag-based queries.
///
/// Implementations must make [`DurableStore::insert`] atomic: of two
/// concurrent inserts for the same key exactly one succeeds.
#[async_trait]
pub trait DurableStore<R>: Send + Sync
where
    R: Clone + Send + Sync + 'static,
{
    /// Insert or replace the record at `key`.
    async fn put(&self, key: &str, record: R, tags: Vec<String>) -> Result<()>;

    /// Insert only if `key` is absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AlreadyExists`] if the key is taken.
    async fn insert(&self, key: &str, record: R, tags: Vec<String>) -> Result<()>;

    /// Fetch a single record.
    async fn get(&self, key: &str) -> Result<Option<R>>;

    /// Return every record carrying all `required_tags`. An empty slice
    /// matches everything.
    async fn query(&self, required_tags: &[String]) -> Result<Vec<R>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}
