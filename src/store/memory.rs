//! In-process store used for tests and embedding.

use super::{DurableStore, StoredEntry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Store backed by a `HashMap`. Contents live as long as the process.
#[derive(Debug)]
pub struct MemoryStore<R> {
    entries: RwLock<HashMap<String, StoredEntry<R>>>,
}

impl<R> MemoryStore<R> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R> DurableStore<R> for MemoryStore<R>
where
    R: Clone + Send + Sync + 'static,
{
    async fn put(&self, key: &str, record: R, tags: Vec<String>) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), StoredEntry { record, tags });
        Ok(())
    }

    async fn insert(&self, key: &str, record: R, tags: Vec<String>) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Err(Error::AlreadyExists {
                key: key.to_string(),
            });
        }
        entries.insert(key.to_string(), StoredEntry { record, tags });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<R>> {
        Ok(self.entries.read().get(key).map(|e| e.record.clone()))
    }

    async fn query(&self, required_tags: &[String]) -> Result<Vec<R>> {
        Ok(self
            .entries
            .read()
            .values()
            .filter(|entry| entry.has_tags(required_tags))
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_insert_rejects_existing_key() {
        let store: MemoryStore<u32> = MemoryStore::new();
        store.insert("k", 1, Vec::new()).await.expect("first insert");

        let err = store.insert("k", 2, Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { ref key } if key == "k"));
        assert_eq!(store.get("k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store: MemoryStore<u32> = MemoryStore::new();
        store.put("k", 1, Vec::new()).await.unwrap();
        store.put("k", 2, Vec::new()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(2));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_by_tags() {
        let store: MemoryStore<u32> = MemoryStore::new();
        store.put("a", 1, tags(&["type:xss", "lang:rust"])).await.unwrap();
        store.put("b", 2, tags(&["type:xss"])).await.unwrap();
        store.put("c", 3, tags(&["type:sqli"])).await.unwrap();

        let mut all = store.query(&[]).await.unwrap();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3]);

        let mut xss = store.query(&tags(&["type:xss"])).await.unwrap();
        xss.sort_unstable();
        assert_eq!(xss, vec![1, 2]);

        let both = store.query(&tags(&["type:xss", "lang:rust"])).await.unwrap();
        assert_eq!(both, vec![1]);
    }
}
