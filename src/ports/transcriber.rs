use std::path::Path;

use crate::domain::DomainError;

/// Port for speech-to-text transcription.
///
/// Implementations wrap a loaded speech model. Calls block the calling
/// thread for the full inference duration; the pipeline invokes them from
/// the capture worker only, never from the GUI thread.
pub trait SpeechTranscriber: Send + Sync {
    /// Load a model from the specified path. Blocking and potentially slow;
    /// called once at startup.
    fn load_model(&self, path: &Path) -> Result<(), DomainError>;

    /// Check if a model is currently loaded.
    fn is_model_loaded(&self) -> bool;

    /// Transcribe a full buffer of mono 16kHz samples, normalized to
    /// [-1.0, 1.0]. No streaming, no partial results, no internal retries;
    /// errors propagate to the caller.
    fn transcribe(&self, samples: &[f32]) -> Result<String, DomainError>;
}
