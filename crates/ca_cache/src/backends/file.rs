use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ca_core::{CacheEntry, CacheStore, Error, Result};

/// Store persisted as one JSON file, rewritten after every write. Survives
/// process restarts, which is what makes the two-phase research/assemble
/// workflow possible across sessions.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)
                .map_err(|e| Error::Cache(format!("corrupt cache file {}: {}", path.display(), e)))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), entry);
        self.persist(&entries)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        self.persist(&entries)
    }

    async fn entries(&self) -> Result<Vec<(String, CacheEntry)>> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
