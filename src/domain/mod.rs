pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod transcript;

pub use audio::{samples_to_f32, AudioChunk, AudioDevice};
pub use config::AppConfig;
pub use error::DomainError;
pub use pipeline::{AtomicPipelineState, PipelineState};
pub use transcript::{TranscriptEntry, TranscriptLog, TranscriptSurface};
