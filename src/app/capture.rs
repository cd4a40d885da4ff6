use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use crate::app::cancel::CancelToken;
use crate::domain::{samples_to_f32, AudioChunk, TranscriptEntry};
use crate::ports::{AudioSource, SpeechTranscriber};

/// Capture worker: drains buffered phrase chunks, transcribes them in one
/// batch, and publishes timestamped entries.
///
/// Every chunk queued at the moment the first one is received is folded into
/// a single model invocation, in arrival order: a burst of phrases collected
/// during one idle interval becomes one utterance. Latency is traded for
/// per-invocation overhead.
///
/// The loop exits when the token is cancelled or the chunk channel
/// disconnects; an in-flight transcription always completes first. On exit
/// the worker halts the audio source before returning. A transcription error
/// terminates the worker: the display side keeps running but no further
/// entries arrive.
pub fn run_capture_loop(
    chunks: Receiver<AudioChunk>,
    entries: Sender<TranscriptEntry>,
    transcriber: Arc<dyn SpeechTranscriber>,
    audio: Arc<dyn AudioSource>,
    cancel: CancelToken,
    poll_interval: Duration,
) {
    info!("Capture worker started");

    while !cancel.is_cancelled() {
        let first = match chunks.recv_timeout(poll_interval) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Drain everything else that queued up since the last cycle
        let mut samples = first.into_samples();
        let mut batched = 1usize;
        for chunk in chunks.try_iter() {
            samples.extend_from_slice(chunk.samples());
            batched += 1;
        }

        debug!(chunks = batched, samples = samples.len(), "Transcribing batch");

        let text = match transcriber.transcribe(&samples_to_f32(&samples)) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Transcription failed, capture worker terminating");
                break;
            }
        };

        if entries.send(TranscriptEntry::now(text)).is_err() {
            // Display side is gone; nothing left to publish to.
            break;
        }
    }

    if let Err(e) = audio.stop_capture() {
        debug!(error = %e, "Audio source already stopped");
    }
    info!("Capture worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AudioDevice, DomainError};
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct RecordingTranscriber {
        reply: Result<String, String>,
        samples_seen: AtomicUsize,
        calls: AtomicUsize,
    }

    impl RecordingTranscriber {
        fn new(reply: Result<&str, &str>) -> Self {
            Self {
                reply: reply.map(String::from).map_err(String::from),
                samples_seen: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SpeechTranscriber for RecordingTranscriber {
        fn load_model(&self, _path: &std::path::Path) -> Result<(), DomainError> {
            Ok(())
        }

        fn is_model_loaded(&self) -> bool {
            true
        }

        fn transcribe(&self, samples: &[f32]) -> Result<String, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.samples_seen.fetch_add(samples.len(), Ordering::SeqCst);
            self.reply
                .clone()
                .map_err(DomainError::Transcription)
        }
    }

    struct StopTrackingSource {
        stopped: AtomicBool,
    }

    impl StopTrackingSource {
        fn new() -> Self {
            Self {
                stopped: AtomicBool::new(false),
            }
        }
    }

    impl AudioSource for StopTrackingSource {
        fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
            Ok(vec![])
        }

        fn start_capture(
            &self,
            _device_id: Option<&str>,
        ) -> Result<Receiver<AudioChunk>, DomainError> {
            Err(DomainError::Audio("not used in tests".to_string()))
        }

        fn stop_capture(&self) -> Result<(), DomainError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_queued_chunks_become_one_entry() {
        let (chunk_tx, chunk_rx) = unbounded();
        let (entry_tx, entry_rx) = unbounded();
        let transcriber = Arc::new(RecordingTranscriber::new(Ok("hello world")));
        let audio = Arc::new(StopTrackingSource::new());

        // Three phrase chunks queued before the worker's first poll
        chunk_tx.send(AudioChunk::new(vec![1i16; 100], 16_000)).unwrap();
        chunk_tx.send(AudioChunk::new(vec![2i16; 200], 16_000)).unwrap();
        chunk_tx.send(AudioChunk::new(vec![3i16; 300], 16_000)).unwrap();
        drop(chunk_tx);

        run_capture_loop(
            chunk_rx,
            entry_tx,
            transcriber.clone(),
            audio.clone(),
            CancelToken::new(),
            Duration::from_millis(10),
        );

        // Exactly one batched invocation over the in-order concatenation
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transcriber.samples_seen.load(Ordering::SeqCst), 600);

        let produced: Vec<_> = entry_rx.try_iter().collect();
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].text(), "hello world");

        // The worker halts the audio source before returning
        assert!(audio.stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_transcription_error_terminates_worker() {
        let (chunk_tx, chunk_rx) = unbounded();
        let (entry_tx, entry_rx) = unbounded();
        let transcriber = Arc::new(RecordingTranscriber::new(Err("bad buffer")));
        let audio = Arc::new(StopTrackingSource::new());

        chunk_tx.send(AudioChunk::new(vec![1i16; 100], 16_000)).unwrap();
        chunk_tx.send(AudioChunk::new(vec![2i16; 100], 16_000)).unwrap();

        run_capture_loop(
            chunk_rx,
            entry_tx,
            transcriber.clone(),
            audio.clone(),
            CancelToken::new(),
            Duration::from_millis(10),
        );

        // One failed call, no entries, audio halted
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert!(entry_rx.try_iter().next().is_none());
        assert!(audio.stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancelled_worker_exits_without_draining() {
        let (_chunk_tx, chunk_rx) = unbounded::<AudioChunk>();
        let (entry_tx, _entry_rx) = unbounded();
        let transcriber = Arc::new(RecordingTranscriber::new(Ok("unused")));
        let audio = Arc::new(StopTrackingSource::new());

        let cancel = CancelToken::new();
        cancel.cancel();

        run_capture_loop(
            chunk_rx,
            entry_tx,
            transcriber.clone(),
            audio.clone(),
            cancel,
            Duration::from_millis(10),
        );

        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
        assert!(audio.stopped.load(Ordering::SeqCst));
    }
}
