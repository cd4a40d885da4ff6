use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::domain::config::TranscriptionConfig;
use crate::domain::DomainError;
use crate::ports::SpeechTranscriber;

/// Transcriber implementation using whisper.cpp via whisper-rs.
///
/// `transcribe` blocks the calling thread for the full inference duration;
/// the pipeline only ever calls it from the capture worker.
pub struct WhisperTranscriber {
    context: RwLock<Option<Arc<WhisperContext>>>,
    language: Option<String>,
    threads: u32,
}

impl WhisperTranscriber {
    /// Create a new WhisperTranscriber. `threads == 0` auto-detects
    /// (cores - 1).
    pub fn new(config: &TranscriptionConfig) -> Self {
        let threads = if config.threads == 0 {
            std::thread::available_parallelism()
                .map(|p| std::cmp::max(1, p.get() as u32 - 1))
                .unwrap_or(1)
        } else {
            config.threads
        };

        info!(threads, language = ?config.language, "WhisperTranscriber created");

        Self {
            context: RwLock::new(None),
            language: config.language.clone(),
            threads,
        }
    }
}

impl SpeechTranscriber for WhisperTranscriber {
    fn load_model(&self, path: &Path) -> Result<(), DomainError> {
        if !path.exists() {
            return Err(DomainError::ModelNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        info!(path = ?path, "Loading whisper model");

        let ctx = WhisperContext::new_with_params(
            &path.to_string_lossy(),
            WhisperContextParameters::default(),
        )
        .map_err(|e| DomainError::Whisper(format!("Failed to load model: {}", e)))?;

        *self.context.write() = Some(Arc::new(ctx));

        info!(path = ?path, "Whisper model loaded successfully");
        Ok(())
    }

    fn is_model_loaded(&self) -> bool {
        self.context.read().is_some()
    }

    fn transcribe(&self, samples: &[f32]) -> Result<String, DomainError> {
        let context = self.context.read().clone();
        let ctx = context.ok_or_else(|| DomainError::Whisper("No model loaded".to_string()))?;

        if samples.is_empty() {
            return Ok(String::new());
        }

        debug!(samples = samples.len(), "Starting transcription");
        let start = std::time::Instant::now();

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads as i32);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_non_speech_tokens(true);

        if let Some(ref lang) = self.language {
            params.set_language(Some(lang.as_str()));
        }

        // Per-call state so the shared context stays immutable
        let mut state = ctx
            .create_state()
            .map_err(|e| DomainError::Whisper(format!("Failed to create whisper state: {}", e)))?;

        state
            .full(params, samples)
            .map_err(|e| DomainError::Whisper(format!("Transcription failed: {}", e)))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| DomainError::Whisper(format!("Failed to get segment count: {}", e)))?;

        let mut text = String::new();
        for i in 0..num_segments {
            if let Ok(segment_text) = state.full_get_segment_text(i) {
                text.push_str(&segment_text);
            }
        }
        let text = text.trim().to_string();

        info!(
            text_len = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Transcription complete"
        );

        Ok(text)
    }
}
