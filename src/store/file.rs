//! JSON file-backed store.
//!
//! The whole keyspace is held in memory and rewritten to disk after every
//! mutation (temp file + rename, so a crash never leaves a torn file).
//! Mutations are serialized by an async mutex that is held across the disk
//! write, which makes [`DurableStore::insert`] atomic.

use super::{DurableStore, StoredEntry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Store persisted as a single JSON document.
pub struct JsonFileStore<R> {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, StoredEntry<R>>>,
}

impl<R> JsonFileStore<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Open the store at `path`, loading existing contents if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::Storage(format!("corrupt store file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!("Opened store {} ({} records)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, StoredEntry<R>>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Storage(format!("rename into {}: {e}", self.path.display())))?;

        debug!("Persisted {} records to {}", entries.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl<R> DurableStore<R> for JsonFileStore<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn put(&self, key: &str, record: R, tags: Vec<String>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(key.to_string(), StoredEntry { record, tags });

        if let Err(e) = self.persist(&entries).await {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn insert(&self, key: &str, record: R, tags: Vec<String>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(key) {
            return Err(Error::AlreadyExists {
                key: key.to_string(),
            });
        }
        entries.insert(key.to_string(), StoredEntry { record, tags });

        if let Err(e) = self.persist(&entries).await {
            entries.remove(key);
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<R>> {
        Ok(self.entries.lock().await.get(key).map(|e| e.record.clone()))
    }

    async fn query(&self, required_tags: &[String]) -> Result<Vec<R>> {
        Ok(self
            .entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.has_tags(required_tags))
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }
}
