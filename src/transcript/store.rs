use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::debug;

/// The single storage key holding the flattened transcript
pub const TRANSCRIPT_KEY: &str = "saved_transcript";

/// Durable key-value storage for the persisted transcript
pub trait TranscriptStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// File-backed store: one JSON object per file
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read store file: {}", self.path.display()))?;

        serde_json::from_str(&raw)
            .with_context(|| format!("Malformed store file: {}", self.path.display()))
    }
}

impl TranscriptStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
            }
        }

        let raw = serde_json::to_string_pretty(&map)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write store file: {}", self.path.display()))?;

        debug!("Stored {} ({} bytes) in {}", key, value.len(), self.path.display());

        Ok(())
    }
}

/// In-memory store for tests and demos
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranscriptStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .map
            .lock()
            .map_err(|_| anyhow::anyhow!("Store lock poisoned"))?
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .lock()
            .map_err(|_| anyhow::anyhow!("Store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
