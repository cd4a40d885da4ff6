use serde::{Deserialize, Serialize};

/// One phrase-bounded batch of raw audio.
///
/// Produced by the audio adapter whenever a silence gap follows
/// energy-threshold speech (or the phrase time limit is hit), consumed and
/// batch-drained by the capture worker. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// PCM audio samples (16-bit mono).
    samples: Vec<i16>,
    /// Sample rate in Hz.
    sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the chunk in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Convert i16 samples to normalized f32 in [-1.0, 1.0], the input format
/// the speech model expects.
pub fn samples_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Input audio device information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Unique device identifier.
    pub id: String,
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the system default device.
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_chunk_duration() {
        let chunk = AudioChunk::new(vec![0i16; 16000], 16000);
        assert!((chunk.duration_secs() - 1.0).abs() < 0.001);
        assert_eq!(chunk.len(), 16000);
        assert!(!chunk.is_empty());
    }

    #[test]
    fn test_samples_to_f32() {
        let converted = samples_to_f32(&[0i16, 16384, -16384, 32767, -32768]);

        assert!((converted[0] - 0.0).abs() < 0.001);
        assert!((converted[1] - 0.5).abs() < 0.001);
        assert!((converted[2] - -0.5).abs() < 0.001);
        assert!((converted[3] - 1.0).abs() < 0.001);
        assert!((converted[4] - -1.0).abs() < 0.001);
    }
}
