use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::app::cancel::CancelToken;
use crate::app::capture::run_capture_loop;
use crate::app::display::run_display_loop;
use crate::domain::{
    AppConfig, AtomicPipelineState, AudioDevice, DomainError, PipelineState, TranscriptEntry,
    TranscriptLog, TranscriptSurface,
};
use crate::ports::{AudioSource, SpeechTranscriber, TranscriptStore};

/// Handles owned by one pipeline run.
struct RunHandles {
    cancel: CancelToken,
    capture: JoinHandle<()>,
    display: JoinHandle<()>,
}

/// Orchestrates the capture/transcribe/display pipeline behind a narrow
/// start/stop/toggle interface, so the GUI is one interchangeable consumer
/// of the shared transcript surface.
///
/// Lifecycle: Idle -> Running -> Stopped, one run per controller. start()
/// is guarded by a compare-exchange, so concurrent or repeated calls cannot
/// spawn a second worker pair over the same channels.
pub struct PipelineController {
    audio: Arc<dyn AudioSource>,
    transcriber: Arc<dyn SpeechTranscriber>,
    store: Arc<dyn TranscriptStore>,
    config: AppConfig,
    state: AtomicPipelineState,
    surface: Arc<TranscriptSurface>,
    log: Arc<Mutex<TranscriptLog>>,
    run: Mutex<Option<RunHandles>>,
}

impl PipelineController {
    pub fn new(
        audio: Arc<dyn AudioSource>,
        transcriber: Arc<dyn SpeechTranscriber>,
        store: Arc<dyn TranscriptStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            audio,
            transcriber,
            store,
            config,
            state: AtomicPipelineState::default(),
            surface: Arc::new(TranscriptSurface::new()),
            log: Arc::new(Mutex::new(TranscriptLog::new())),
            run: Mutex::new(None),
        }
    }

    /// List available microphones.
    pub fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        self.audio.list_input_devices()
    }

    /// Start the pipeline on the given device (or the system default).
    ///
    /// Valid only from Idle; a second call while Running fails instead of
    /// spawning a duplicate worker pair.
    pub fn start(&self, device_id: Option<&str>) -> Result<(), DomainError> {
        if !self
            .state
            .compare_exchange(PipelineState::Idle, PipelineState::Running)
        {
            return Err(DomainError::PipelineStateTransition {
                from: self.state.load(),
                to: PipelineState::Running,
            });
        }

        match self.audio.list_input_devices() {
            Ok(devices) if devices.is_empty() => {
                self.state.store(PipelineState::Idle);
                return Err(DomainError::NoInputDevices);
            }
            Err(e) => {
                self.state.store(PipelineState::Idle);
                return Err(e);
            }
            Ok(_) => {}
        }

        let chunks = match self.audio.start_capture(device_id) {
            Ok(rx) => rx,
            Err(e) => {
                self.state.store(PipelineState::Idle);
                return Err(e);
            }
        };

        let poll_interval = Duration::from_millis(self.config.capture.poll_interval_ms);
        let cancel = CancelToken::new();
        let (entry_tx, entry_rx) = unbounded::<TranscriptEntry>();

        let capture = {
            let transcriber = Arc::clone(&self.transcriber);
            let audio = Arc::clone(&self.audio);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("capture-loop".to_string())
                .spawn(move || {
                    run_capture_loop(chunks, entry_tx, transcriber, audio, cancel, poll_interval)
                })
        };
        let capture = match capture {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.audio.stop_capture();
                self.state.store(PipelineState::Idle);
                return Err(DomainError::Audio(format!(
                    "Failed to spawn capture worker: {}",
                    e
                )));
            }
        };

        let display = {
            let surface = Arc::clone(&self.surface);
            let log = Arc::clone(&self.log);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("display-loop".to_string())
                .spawn(move || run_display_loop(entry_rx, surface, log, cancel, poll_interval))
        };
        let display = match display {
            Ok(handle) => handle,
            Err(e) => {
                cancel.cancel();
                let _ = capture.join();
                self.state.store(PipelineState::Idle);
                return Err(DomainError::Audio(format!(
                    "Failed to spawn display worker: {}",
                    e
                )));
            }
        };

        *self.run.lock() = Some(RunHandles {
            cancel,
            capture,
            display,
        });

        info!(device_id = ?device_id, "Pipeline started");
        Ok(())
    }

    /// Stop the pipeline, wait for both workers to exit, and persist the
    /// transcript log.
    ///
    /// Blocks the caller until the capture worker has finished any in-flight
    /// transcription and the display worker has drained every queued entry,
    /// so the persisted file reflects the complete run.
    pub fn stop(&self) -> Result<(), DomainError> {
        if !self.state.load().can_stop() {
            return Err(DomainError::PipelineStateTransition {
                from: self.state.load(),
                to: PipelineState::Stopped,
            });
        }

        let Some(handles) = self.run.lock().take() else {
            return Err(DomainError::PipelineStateTransition {
                from: self.state.load(),
                to: PipelineState::Stopped,
            });
        };

        info!("Stopping pipeline");
        handles.cancel.cancel();

        if handles.capture.join().is_err() {
            error!("Capture worker panicked");
        }
        if handles.display.join().is_err() {
            error!("Display worker panicked");
        }

        let persist_result = self.store.persist(&self.log.lock());
        if let Err(ref e) = persist_result {
            warn!(error = %e, "Failed to persist transcript");
        }

        self.state.store(PipelineState::Stopped);
        info!(entries = self.log.lock().len(), "Pipeline stopped");

        persist_result
    }

    /// Flip the transcript pad between read-only and editable. Independent
    /// of the pipeline lifecycle; never touches the transcript log.
    pub fn toggle_editing(&self) -> bool {
        let editable = self.surface.toggle_editable();
        info!(editable, "Transcript editing toggled");
        editable
    }

    /// The shared transcript surface the GUI renders each frame.
    pub fn surface(&self) -> Arc<TranscriptSurface> {
        Arc::clone(&self.surface)
    }

    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    /// Snapshot of the authoritative transcript log.
    pub fn transcript_entries(&self) -> Vec<TranscriptEntry> {
        self.log.lock().entries().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FileTranscriptStore;
    use crate::domain::AudioChunk;
    use crossbeam_channel::{Receiver, Sender};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Audio source whose chunks are injected by the test.
    struct ScriptedAudioSource {
        devices: Vec<AudioDevice>,
        initial_chunks: Vec<AudioChunk>,
        tx: Mutex<Option<Sender<AudioChunk>>>,
    }

    impl ScriptedAudioSource {
        fn new(initial_chunks: Vec<AudioChunk>) -> Self {
            Self {
                devices: vec![AudioDevice {
                    id: "mic0".to_string(),
                    name: "Test Microphone".to_string(),
                    is_default: true,
                }],
                initial_chunks,
                tx: Mutex::new(None),
            }
        }

        fn without_devices() -> Self {
            Self {
                devices: vec![],
                initial_chunks: vec![],
                tx: Mutex::new(None),
            }
        }

        fn send_chunk(&self, chunk: AudioChunk) {
            let tx = self.tx.lock();
            tx.as_ref().expect("capture not started").send(chunk).unwrap();
        }
    }

    impl AudioSource for ScriptedAudioSource {
        fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
            Ok(self.devices.clone())
        }

        fn start_capture(
            &self,
            _device_id: Option<&str>,
        ) -> Result<Receiver<AudioChunk>, DomainError> {
            let (tx, rx) = unbounded();
            for chunk in &self.initial_chunks {
                tx.send(chunk.clone()).unwrap();
            }
            *self.tx.lock() = Some(tx);
            Ok(rx)
        }

        fn stop_capture(&self) -> Result<(), DomainError> {
            // Dropping the sender disconnects the chunk channel
            self.tx.lock().take();
            Ok(())
        }
    }

    struct FixedTranscriber {
        reply: String,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedTranscriber {
        fn new(reply: &str, delay: Duration) -> Self {
            Self {
                reply: reply.to_string(),
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SpeechTranscriber for FixedTranscriber {
        fn load_model(&self, _path: &std::path::Path) -> Result<(), DomainError> {
            Ok(())
        }

        fn is_model_loaded(&self) -> bool {
            true
        }

        fn transcribe(&self, _samples: &[f32]) -> Result<String, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(self.reply.clone())
        }
    }

    fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("talkpad_controller_test");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.capture.poll_interval_ms = 10;
        config
    }

    fn controller(
        audio: Arc<ScriptedAudioSource>,
        transcriber: Arc<FixedTranscriber>,
        output: &PathBuf,
    ) -> PipelineController {
        PipelineController::new(
            audio,
            transcriber,
            Arc::new(FileTranscriptStore::new(output)),
            fast_config(),
        )
    }

    fn wait_until(mut pred: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if pred() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        pred()
    }

    #[test]
    fn test_chunks_queued_before_first_poll_become_one_entry() {
        let output = scratch_file("scenario.txt");
        let audio = Arc::new(ScriptedAudioSource::new(vec![
            AudioChunk::new(vec![1i16; 160], 16_000),
            AudioChunk::new(vec![2i16; 160], 16_000),
            AudioChunk::new(vec![3i16; 160], 16_000),
        ]));
        let transcriber = Arc::new(FixedTranscriber::new("hello world", Duration::ZERO));
        let ctrl = controller(audio, transcriber.clone(), &output);

        ctrl.start(Some("mic0")).unwrap();
        assert_eq!(ctrl.state(), PipelineState::Running);

        // One entry flows queue -> log -> surface
        assert!(wait_until(
            || ctrl.transcript_entries().len() == 1,
            Duration::from_secs(2)
        ));
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctrl.transcript_entries()[0].text(), "hello world");
        assert!(ctrl.surface().text().contains("hello world"));

        ctrl.stop().unwrap();
        assert_eq!(ctrl.state(), PipelineState::Stopped);

        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" - hello world"));

        let _ = fs::remove_file(&output);
    }

    #[test]
    fn test_start_is_guarded_against_double_start() {
        let output = scratch_file("double_start.txt");
        let audio = Arc::new(ScriptedAudioSource::new(vec![]));
        let transcriber = Arc::new(FixedTranscriber::new("x", Duration::ZERO));
        let ctrl = controller(audio, transcriber, &output);

        ctrl.start(None).unwrap();
        let second = ctrl.start(None);
        assert!(matches!(
            second,
            Err(DomainError::PipelineStateTransition { .. })
        ));

        ctrl.stop().unwrap();
        let _ = fs::remove_file(&output);
    }

    #[test]
    fn test_start_requires_a_microphone() {
        let output = scratch_file("no_devices.txt");
        let audio = Arc::new(ScriptedAudioSource::without_devices());
        let transcriber = Arc::new(FixedTranscriber::new("x", Duration::ZERO));
        let ctrl = controller(audio, transcriber, &output);

        assert!(matches!(ctrl.start(None), Err(DomainError::NoInputDevices)));
        // Guard released: the controller is still Idle
        assert_eq!(ctrl.state(), PipelineState::Idle);
    }

    #[test]
    fn test_stop_without_start_fails() {
        let output = scratch_file("stop_idle.txt");
        let audio = Arc::new(ScriptedAudioSource::new(vec![]));
        let transcriber = Arc::new(FixedTranscriber::new("x", Duration::ZERO));
        let ctrl = controller(audio, transcriber, &output);

        assert!(matches!(
            ctrl.stop(),
            Err(DomainError::PipelineStateTransition { .. })
        ));
    }

    #[test]
    fn test_stop_waits_for_in_flight_transcription() {
        let output = scratch_file("in_flight.txt");
        let audio = Arc::new(ScriptedAudioSource::new(vec![]));
        let transcriber = Arc::new(FixedTranscriber::new(
            "in flight",
            Duration::from_millis(300),
        ));
        let ctrl = controller(audio.clone(), transcriber.clone(), &output);

        ctrl.start(None).unwrap();
        audio.send_chunk(AudioChunk::new(vec![1i16; 160], 16_000));

        // Let the capture worker pick the chunk up and enter transcribe()
        assert!(wait_until(
            || transcriber.calls.load(Ordering::SeqCst) == 1,
            Duration::from_secs(2)
        ));

        ctrl.stop().unwrap();

        // stop() returned only after the in-flight result reached the log
        // and the persisted file
        assert_eq!(ctrl.transcript_entries().len(), 1);
        assert_eq!(ctrl.transcript_entries()[0].text(), "in flight");
        let content = fs::read_to_string(&output).unwrap();
        assert!(content.trim_end().ends_with(" - in flight"));

        let _ = fs::remove_file(&output);
    }

    #[test]
    fn test_empty_run_persists_empty_file() {
        let output = scratch_file("empty_run.txt");
        let audio = Arc::new(ScriptedAudioSource::new(vec![]));
        let transcriber = Arc::new(FixedTranscriber::new("x", Duration::ZERO));
        let ctrl = controller(audio, transcriber, &output);

        ctrl.start(None).unwrap();
        ctrl.stop().unwrap();

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.is_empty());

        let _ = fs::remove_file(&output);
    }

    #[test]
    fn test_toggle_editing_is_independent_of_lifecycle() {
        let output = scratch_file("toggle.txt");
        let audio = Arc::new(ScriptedAudioSource::new(vec![]));
        let transcriber = Arc::new(FixedTranscriber::new("x", Duration::ZERO));
        let ctrl = controller(audio, transcriber, &output);

        // Idle
        assert!(ctrl.toggle_editing());
        assert!(!ctrl.toggle_editing());

        ctrl.start(None).unwrap();
        assert!(ctrl.toggle_editing());
        ctrl.stop().unwrap();

        // Stopped; the flag still flips and the log is untouched
        assert!(!ctrl.toggle_editing());
        assert!(ctrl.transcript_entries().is_empty());

        let _ = fs::remove_file(&output);
    }
}
