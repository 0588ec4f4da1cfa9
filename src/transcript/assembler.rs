use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::{TranscriptStore, TRANSCRIPT_KEY};

/// A single timestamped transcript entry. Immutable once created; entries
/// are ordered strictly by creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Wall-clock seconds since session start when the entry was applied
    pub elapsed_secs: u64,
    /// Formatted `M:SS` label
    pub label: String,
    /// Recognized text
    pub text: String,
}

impl TranscriptEntry {
    fn render(&self) -> String {
        format!("[{}] {}\n\n", self.label, self.text)
    }
}

/// Accumulates transcript entries and handles persistence.
///
/// The persisted form is the flattened text only; after a restart the prior
/// transcript is carried as one opaque pre-formatted block, not reparsed
/// into entries.
pub struct TranscriptAssembler {
    store: Box<dyn TranscriptStore>,
    /// Opaque text restored from a previous run
    restored: String,
    entries: Vec<TranscriptEntry>,
}

impl TranscriptAssembler {
    pub fn new(store: Box<dyn TranscriptStore>) -> Self {
        Self {
            store,
            restored: String::new(),
            entries: Vec::new(),
        }
    }

    /// Format elapsed seconds as `M:SS` with zero-padded seconds
    pub fn format_elapsed(elapsed_secs: u64) -> String {
        format!("{}:{:02}", elapsed_secs / 60, elapsed_secs % 60)
    }

    /// Append a new entry. Returns a copy for event fanout.
    pub fn append(&mut self, elapsed_secs: u64, text: &str) -> TranscriptEntry {
        let entry = TranscriptEntry {
            elapsed_secs,
            label: Self::format_elapsed(elapsed_secs),
            text: text.to_string(),
        };

        debug!("Transcript entry appended at [{}]", entry.label);

        self.entries.push(entry.clone());
        entry
    }

    /// The full transcript as rendered text: restored prefix plus every
    /// entry appended this run.
    pub fn snapshot(&self) -> String {
        let mut out = self.restored.clone();
        for entry in &self.entries {
            out.push_str(&entry.render());
        }
        out
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Empty the transcript view. Persisted storage is untouched until the
    /// next `persist`.
    pub fn clear(&mut self) {
        info!("Transcript cleared ({} entries)", self.entries.len());
        self.restored.clear();
        self.entries.clear();
    }

    /// Flatten and write the transcript to storage, overwriting any prior
    /// value.
    pub fn persist(&self) -> Result<()> {
        let text = self.snapshot();
        self.store
            .set(TRANSCRIPT_KEY, &text)
            .context("Failed to persist transcript")?;
        info!("Transcript persisted ({} bytes)", text.len());
        Ok(())
    }

    /// Seed the transcript from the previously persisted text, if any.
    pub fn restore(&mut self) -> Result<Option<String>> {
        match self.store.get(TRANSCRIPT_KEY)? {
            Some(text) if !text.is_empty() => {
                info!("Restored persisted transcript ({} bytes)", text.len());
                self.restored = text.clone();
                Ok(Some(text))
            }
            _ => Ok(None),
        }
    }
}
