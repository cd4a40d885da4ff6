use crate::domain::{DomainError, TranscriptLog};

/// Port for transcript persistence.
pub trait TranscriptStore: Send + Sync {
    /// Write the whole log, replacing any previous content. An empty log
    /// produces an empty file.
    fn persist(&self, log: &TranscriptLog) -> Result<(), DomainError>;
}
