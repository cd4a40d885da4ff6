use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::app::cancel::CancelToken;
use crate::domain::{TranscriptEntry, TranscriptLog, TranscriptSurface};

/// Display worker: consumes transcript entries in FIFO order and appends
/// each to the visible surface and the in-memory log.
///
/// The surface append never changes the pad's editable flag and records an
/// auto-scroll request for the GUI. The worker exits when the entry channel
/// disconnects: the capture worker drops its sender within one poll interval
/// of cancellation, so every queued entry is drained before exit and the
/// in-flight result of a stop still reaches the log.
pub fn run_display_loop(
    entries: Receiver<TranscriptEntry>,
    surface: Arc<TranscriptSurface>,
    log: Arc<Mutex<TranscriptLog>>,
    cancel: CancelToken,
    poll_interval: Duration,
) {
    info!("Display worker started");

    loop {
        match entries.recv_timeout(poll_interval) {
            Ok(entry) => {
                surface.append_line(&entry.format_line());
                log.lock().push(entry);
            }
            Err(RecvTimeoutError::Timeout) => {
                // After cancellation the producer disconnects the channel
                // within one poll interval; keep receiving until then so
                // queued entries and an in-flight result are not lost.
                if cancel.is_cancelled() {
                    debug!("Stop observed, draining until producer disconnects");
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Display worker exited");
}
