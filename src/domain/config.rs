use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Path to the whisper.cpp model file.
    pub model_path: PathBuf,
    /// Language hint (ISO 639-1 code, e.g. "en"). None for auto-detection.
    pub language: Option<String>,
    /// Number of inference threads (0 = auto).
    pub threads: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.en.bin"),
            language: None,
            threads: 0,
        }
    }
}

/// Audio capture and phrase segmentation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    /// RMS amplitude (i16 scale) above which audio counts as speech.
    pub energy_threshold: u32,
    /// Maximum length of one phrase-bounded chunk, in seconds.
    pub record_timeout_secs: f32,
    /// Accepted for compatibility; not consumed by the pipeline.
    pub phrase_timeout_secs: f32,
    /// Silence gap that closes a phrase, in seconds.
    pub silence_timeout_secs: f32,
    /// Worker idle-poll interval in milliseconds. Bounds how late a worker
    /// may observe cancellation.
    pub poll_interval_ms: u64,
    /// Ring buffer size between the stream callback and the audio thread,
    /// in seconds of audio.
    pub buffer_duration_secs: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000, // 16kHz for Whisper
            energy_threshold: 1000,
            record_timeout_secs: 2.0,
            phrase_timeout_secs: 3.0,
            silence_timeout_secs: 0.8,
            poll_interval_ms: 100,
            buffer_duration_secs: 10,
        }
    }
}

impl CaptureConfig {
    /// Ring buffer capacity in samples.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_duration_secs as usize * self.sample_rate as usize
    }

    /// Phrase time limit in samples.
    pub fn record_timeout_samples(&self) -> usize {
        (self.record_timeout_secs * self.sample_rate as f32) as usize
    }

    /// Phrase-closing silence gap in samples.
    pub fn silence_timeout_samples(&self) -> usize {
        (self.silence_timeout_secs * self.sample_rate as f32) as usize
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the transcript is written on stop. Overwritten each run.
    pub transcript_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            transcript_path: PathBuf::from("transcription.txt"),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub transcription: TranscriptionConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.energy_threshold, 1000);
        assert!((config.record_timeout_secs - 2.0).abs() < f32::EPSILON);
        assert!((config.phrase_timeout_secs - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_capture_sample_conversions() {
        let config = CaptureConfig::default();
        assert_eq!(config.buffer_capacity(), 160_000);
        assert_eq!(config.record_timeout_samples(), 32_000);
        assert_eq!(config.silence_timeout_samples(), 12_800);
    }

    #[test]
    fn test_output_default() {
        let config = OutputConfig::default();
        assert_eq!(config.transcript_path, PathBuf::from("transcription.txt"));
    }
}
