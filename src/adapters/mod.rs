pub mod audio_cpal;
pub mod config_store;
pub mod transcript_file;
pub mod whisper_cpp;

pub use audio_cpal::CpalAudioSource;
pub use config_store::TomlConfigStore;
pub use transcript_file::FileTranscriptStore;
pub use whisper_cpp::WhisperTranscriber;
