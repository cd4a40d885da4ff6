use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::domain::{DomainError, TranscriptLog};
use crate::ports::TranscriptStore;

/// Flat-text transcript store: one formatted line per entry, overwriting any
/// previous file content on every persist.
pub struct FileTranscriptStore {
    path: PathBuf,
}

impl FileTranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TranscriptStore for FileTranscriptStore {
    fn persist(&self, log: &TranscriptLog) -> Result<(), DomainError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut content = log.lines().join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&self.path, content)?;

        info!(path = ?self.path, entries = log.len(), "Transcript persisted");
        Ok(())
    }
}
