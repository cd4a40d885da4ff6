use crate::domain::pipeline::PipelineState;
use thiserror::Error;

/// Domain-level errors for TalkPad.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Audio device error: {message}")]
    AudioDevice { message: String },

    #[error("No audio input devices available")]
    NoInputDevices,

    #[error("Invalid pipeline state transition from {from:?} to {to:?}")]
    PipelineStateTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Whisper error: {0}")]
    Whisper(String),

    #[error("UI error: {0}")]
    Ui(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
