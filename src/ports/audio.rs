use crossbeam_channel::Receiver;

use crate::domain::{AudioChunk, AudioDevice, DomainError};

/// Port for microphone capture.
///
/// Implementations own the platform audio machinery (device handles, the
/// capture thread) and deliver phrase-bounded chunks over a channel: a chunk
/// is emitted whenever a silence gap follows energy-threshold speech, bounded
/// by the configured phrase time limit.
pub trait AudioSource: Send + Sync {
    /// List available audio input devices.
    fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError>;

    /// Start capturing from the given device (or the system default).
    ///
    /// Returns the receiving end of the chunk channel. The channel
    /// disconnects when capture stops. Returns an error if capture is
    /// already running or the device cannot be opened.
    fn start_capture(&self, device_id: Option<&str>) -> Result<Receiver<AudioChunk>, DomainError>;

    /// Halt capture and tear down the stream.
    ///
    /// Blocks until the capture side has released the device. A no-op error
    /// if capture is not running.
    fn stop_capture(&self) -> Result<(), DomainError>;
}
