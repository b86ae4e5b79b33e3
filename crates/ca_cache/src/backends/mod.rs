use std::path::Path;
use std::sync::Arc;

use ca_core::{CacheStore, Error, Result};

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Build a cache store by backend name, as selected on the CLI.
pub fn create_store(kind: &str, path: Option<&Path>) -> Result<Arc<dyn CacheStore>> {
    match kind {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "file" => {
            let path = path
                .ok_or_else(|| Error::Config("file store requires a path".to_string()))?;
            Ok(Arc::new(JsonFileStore::open(path)?))
        }
        other => Err(Error::Config(format!("Unknown cache backend: {}", other))),
    }
}
