use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use talkpad::adapters::{
    CpalAudioSource, FileTranscriptStore, TomlConfigStore, WhisperTranscriber,
};
use talkpad::app::PipelineController;
use talkpad::domain::AppConfig;
use talkpad::infrastructure::init_logging;
use talkpad::ports::{ConfigStore, SpeechTranscriber};
use talkpad::ui;

/// Live microphone transcription with an editable transcript pad.
#[derive(Debug, Parser)]
#[command(name = "talkpad", version, about)]
struct Cli {
    /// Path to the whisper.cpp model file
    #[arg(long)]
    model: Option<PathBuf>,

    /// RMS amplitude (i16 scale) above which audio counts as speech
    #[arg(long)]
    energy_threshold: Option<u32>,

    /// Maximum length of one phrase-bounded chunk, in seconds
    #[arg(long)]
    record_timeout: Option<f32>,

    /// Accepted for compatibility; not consumed by the pipeline
    #[arg(long)]
    phrase_timeout: Option<f32>,

    /// Where the transcript is written on stop
    #[arg(long)]
    output: Option<PathBuf>,

    /// Microphone device id to preselect
    #[arg(long)]
    device: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,
}

/// CLI flags override the stored configuration for this session only.
fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(ref model) = cli.model {
        config.transcription.model_path = model.clone();
    }
    if let Some(threshold) = cli.energy_threshold {
        config.capture.energy_threshold = threshold;
    }
    if let Some(timeout) = cli.record_timeout {
        config.capture.record_timeout_secs = timeout;
    }
    if let Some(timeout) = cli.phrase_timeout {
        config.capture.phrase_timeout_secs = timeout;
    }
    if let Some(ref output) = cli.output {
        config.output.transcript_path = output.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_store = TomlConfigStore::new().context("Failed to initialize configuration")?;
    let mut config = config_store
        .load()
        .context("Failed to load configuration")?;
    apply_cli_overrides(&mut config, &cli);

    let _log_guard = init_logging(
        &config_store.logs_dir(),
        &config.logging.level,
        config.logging.file_logging,
    )
    .context("Failed to initialize logging")?;

    info!("TalkPad starting up");

    // Model load is blocking and one-time; failure here is fatal.
    let transcriber = Arc::new(WhisperTranscriber::new(&config.transcription));
    transcriber
        .load_model(&config.transcription.model_path)
        .context("Failed to load speech model")?;

    let audio =
        Arc::new(CpalAudioSource::new(config.capture.clone()).context("Failed to set up audio")?);
    let store = Arc::new(FileTranscriptStore::new(
        config.output.transcript_path.clone(),
    ));

    let controller = Arc::new(PipelineController::new(audio, transcriber, store, config));

    ui::run_app(controller, cli.device).context("GUI error")?;

    info!("TalkPad shut down");
    Ok(())
}
