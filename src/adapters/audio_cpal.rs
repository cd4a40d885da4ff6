use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tracing::{debug, error, info, warn};

use crate::domain::config::CaptureConfig;
use crate::domain::{AudioChunk, AudioDevice, DomainError};
use crate::ports::AudioSource;

/// Lock-free ring buffer for audio samples.
type RingProducer = ringbuf::HeapProd<i16>;
type RingConsumer = ringbuf::HeapCons<i16>;

/// How often the audio thread drains the ring between command polls.
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Phrase-detector frame length in milliseconds.
const FRAME_MS: usize = 30;

/// Commands sent to the audio thread.
enum AudioCommand {
    Start {
        device_id: Option<String>,
        chunk_tx: Sender<AudioChunk>,
        reply: Sender<Result<(), DomainError>>,
    },
    Stop {
        reply: Sender<Result<(), DomainError>>,
    },
    Shutdown,
}

/// Audio processing utilities.
mod audio_processing {
    use super::*;

    pub fn get_device(selected_device_id: Option<&str>) -> Result<Device, DomainError> {
        let host = cpal::default_host();

        if let Some(id) = selected_device_id {
            let devices = host.input_devices().map_err(|e| DomainError::AudioDevice {
                message: format!("Failed to enumerate devices: {}", e),
            })?;

            for device in devices {
                if let Ok(name) = device.name() {
                    if name == id {
                        return Ok(device);
                    }
                }
            }
            warn!(device_id = %id, "Selected device not found, falling back to default");
        }

        host.default_input_device()
            .ok_or_else(|| DomainError::AudioDevice {
                message: "No default input device available".to_string(),
            })
    }

    pub fn build_stream_config(device: &Device) -> Result<StreamConfig, DomainError> {
        let supported = device
            .default_input_config()
            .map_err(|e| DomainError::AudioDevice {
                message: format!("Failed to get default config: {}", e),
            })?;

        debug!(
            sample_rate = ?supported.sample_rate(),
            channels = supported.channels(),
            format = ?supported.sample_format(),
            "Device default config"
        );

        Ok(StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        })
    }

    /// Build the input stream. The real-time callback only downmixes,
    /// resamples and pushes into the ring buffer; segmentation happens on
    /// the audio thread.
    pub fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        target_sample_rate: u32,
        mut producer: RingProducer,
    ) -> Result<Stream, DomainError> {
        let channels = config.channels as usize;
        let device_sample_rate = config.sample_rate.0;

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    process_samples_i16(
                        data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &mut producer,
                    );
                },
                move |err| {
                    error!(?err, "Audio stream error");
                },
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let i16_data: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();

                    process_samples_i16(
                        &i16_data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &mut producer,
                    );
                },
                move |err| {
                    error!(?err, "Audio stream error");
                },
                None,
            ),
            _ => {
                return Err(DomainError::AudioDevice {
                    message: format!("Unsupported sample format: {:?}", sample_format),
                });
            }
        }
        .map_err(|e| DomainError::AudioDevice {
            message: format!("Failed to build stream: {}", e),
        })?;

        Ok(stream)
    }

    fn process_samples_i16(
        data: &[i16],
        channels: usize,
        device_sample_rate: u32,
        target_sample_rate: u32,
        producer: &mut RingProducer,
    ) {
        let mono_samples = downmix_to_mono(data, channels);

        let resampled = if device_sample_rate != target_sample_rate {
            resample(&mono_samples, device_sample_rate, target_sample_rate)
        } else {
            mono_samples
        };

        let _ = producer.push_slice(&resampled);
    }

    pub fn downmix_to_mono(data: &[i16], channels: usize) -> Vec<i16> {
        if channels <= 1 {
            return data.to_vec();
        }
        data.chunks(channels)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    }

    /// RMS amplitude on the raw i16 scale, matched against the configured
    /// energy threshold.
    pub fn rms_i16(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
        (sum_squares / samples.len() as f64).sqrt() as f32
    }

    pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
        if from_rate == to_rate || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = from_rate as f64 / to_rate as f64;
        let output_len = (samples.len() as f64 / ratio).ceil() as usize;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = src_pos.fract();

            let sample = if src_idx + 1 < samples.len() {
                let s0 = samples[src_idx] as f64;
                let s1 = samples[src_idx + 1] as f64;
                (s0 + (s1 - s0) * frac) as i16
            } else if src_idx < samples.len() {
                samples[src_idx]
            } else {
                0
            };
            output.push(sample);
        }
        output
    }
}

/// Energy-threshold phrase segmentation.
///
/// Frames whose RMS exceeds the threshold open or extend a phrase; a
/// configured run of sub-threshold frames closes it and yields one chunk.
/// The phrase time limit caps chunk length: speech longer than the limit is
/// split and segmentation continues on the remainder. Sub-threshold audio
/// outside a phrase is discarded.
struct PhraseDetector {
    sample_rate: u32,
    threshold: f32,
    frame_samples: usize,
    max_phrase_samples: usize,
    silence_samples: usize,
    pending: Vec<i16>,
    current: Vec<i16>,
    silence_run: usize,
    in_phrase: bool,
}

impl PhraseDetector {
    fn new(config: &CaptureConfig) -> Self {
        let frame_samples = (config.sample_rate as usize * FRAME_MS / 1000).max(1);
        Self {
            sample_rate: config.sample_rate,
            threshold: config.energy_threshold as f32,
            frame_samples,
            max_phrase_samples: config.record_timeout_samples().max(frame_samples),
            silence_samples: config.silence_timeout_samples().max(frame_samples),
            pending: Vec::new(),
            current: Vec::new(),
            silence_run: 0,
            in_phrase: false,
        }
    }

    /// Feed captured samples; returns any phrases completed by them.
    fn push(&mut self, samples: &[i16]) -> Vec<AudioChunk> {
        self.pending.extend_from_slice(samples);

        let mut chunks = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let frame: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
            if let Some(chunk) = self.process_frame(&frame) {
                chunks.push(chunk);
            }
        }
        chunks
    }

    fn process_frame(&mut self, frame: &[i16]) -> Option<AudioChunk> {
        let energy = audio_processing::rms_i16(frame);

        if energy >= self.threshold {
            self.in_phrase = true;
            self.silence_run = 0;
            self.current.extend_from_slice(frame);
        } else if self.in_phrase {
            self.silence_run += frame.len();
            self.current.extend_from_slice(frame);
            if self.silence_run >= self.silence_samples {
                return Some(self.take_phrase(false));
            }
        }

        if self.in_phrase && self.current.len() >= self.max_phrase_samples {
            return Some(self.take_phrase(true));
        }
        None
    }

    fn take_phrase(&mut self, keep_open: bool) -> AudioChunk {
        self.in_phrase = keep_open;
        self.silence_run = 0;
        AudioChunk::new(std::mem::take(&mut self.current), self.sample_rate)
    }
}

/// Audio thread runner - creates the Stream on the audio thread because it
/// is not Send. Drains the ring buffer into the phrase detector between
/// command polls.
fn audio_thread_main(config: CaptureConfig, cmd_rx: Receiver<AudioCommand>) {
    let mut stream: Option<Stream> = None;
    let mut ring_consumer: Option<RingConsumer> = None;
    let mut detector: Option<PhraseDetector> = None;
    let mut chunk_tx: Option<Sender<AudioChunk>> = None;

    loop {
        match cmd_rx.recv_timeout(DRAIN_INTERVAL) {
            Ok(AudioCommand::Start {
                device_id,
                chunk_tx: tx,
                reply,
            }) => {
                let result = (|| -> Result<(), DomainError> {
                    if stream.is_some() {
                        return Err(DomainError::Audio("Capture already running".to_string()));
                    }

                    let device = audio_processing::get_device(device_id.as_deref())?;
                    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                    let stream_config = audio_processing::build_stream_config(&device)?;

                    let ring = HeapRb::<i16>::new(config.buffer_capacity());
                    let (producer, consumer) = ring.split();

                    let sample_format = device
                        .default_input_config()
                        .map_err(|e| DomainError::AudioDevice {
                            message: format!("Failed to get config: {}", e),
                        })?
                        .sample_format();

                    let new_stream = audio_processing::build_stream(
                        &device,
                        &stream_config,
                        sample_format,
                        config.sample_rate,
                        producer,
                    )?;

                    new_stream.play().map_err(|e| DomainError::AudioDevice {
                        message: format!("Failed to start stream: {}", e),
                    })?;

                    stream = Some(new_stream);
                    ring_consumer = Some(consumer);
                    detector = Some(PhraseDetector::new(&config));

                    info!(device = %device_name, "Capture started");
                    Ok(())
                })();

                if result.is_ok() {
                    chunk_tx = Some(tx);
                }
                let _ = reply.send(result);
            }
            Ok(AudioCommand::Stop { reply }) => {
                let result = if stream.is_some() {
                    stream.take();
                    ring_consumer.take();
                    detector.take();
                    // Dropping the sender disconnects the chunk channel,
                    // signalling end-of-stream to the capture worker.
                    chunk_tx.take();
                    info!("Capture stopped");
                    Ok(())
                } else {
                    Err(DomainError::Audio("Capture not running".to_string()))
                };
                let _ = reply.send(result);
            }
            Ok(AudioCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let (Some(consumer), Some(det), Some(tx)) =
                    (ring_consumer.as_mut(), detector.as_mut(), chunk_tx.as_ref())
                else {
                    continue;
                };

                let available = consumer.occupied_len();
                if available == 0 {
                    continue;
                }

                let mut samples = vec![0i16; available];
                let read = consumer.pop_slice(&mut samples);
                samples.truncate(read);

                for chunk in det.push(&samples) {
                    debug!(
                        samples = chunk.len(),
                        duration_secs = chunk.duration_secs(),
                        "Phrase detected"
                    );
                    if tx.send(chunk).is_err() {
                        // Receiver gone; a Stop command is on its way.
                        break;
                    }
                }
            }
        }
    }
    debug!("Audio thread shutting down");
}

/// cpal-based microphone source.
///
/// Uses a dedicated audio thread to handle the non-Send Stream type; the
/// thread also runs phrase segmentation so the real-time callback stays
/// allocation-light.
pub struct CpalAudioSource {
    cmd_tx: Sender<AudioCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalAudioSource {
    pub fn new(config: CaptureConfig) -> Result<Self, DomainError> {
        let (cmd_tx, cmd_rx) = unbounded();

        let thread_config = config.clone();
        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || audio_thread_main(thread_config, cmd_rx))
            .map_err(|e| DomainError::AudioDevice {
                message: format!("Failed to spawn audio thread: {}", e),
            })?;

        info!(
            sample_rate = config.sample_rate,
            energy_threshold = config.energy_threshold,
            record_timeout_secs = config.record_timeout_secs,
            "CpalAudioSource initialized"
        );

        Ok(Self {
            cmd_tx,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    /// List available input devices with unique IDs.
    fn list_devices_internal(&self) -> Result<Vec<AudioDevice>, DomainError> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = host.input_devices().map_err(|e| DomainError::AudioDevice {
            message: format!("Failed to enumerate devices: {}", e),
        })?;

        let mut result = Vec::new();
        let mut name_counts: std::collections::HashMap<String, usize> =
            std::collections::HashMap::new();

        for device in devices {
            if let Ok(name) = device.name() {
                // Generate unique ID by appending index for duplicate names
                let count = name_counts.entry(name.clone()).or_insert(0);
                let id = if *count == 0 {
                    name.clone()
                } else {
                    format!("{}:{}", name, count)
                };
                *count += 1;

                result.push(AudioDevice {
                    id,
                    name: name.clone(),
                    is_default: Some(&name) == default_name.as_ref(),
                });
            }
        }

        debug!(count = result.len(), "Listed input devices");
        Ok(result)
    }
}

impl Drop for CpalAudioSource {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);

        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl AudioSource for CpalAudioSource {
    fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        self.list_devices_internal()
    }

    fn start_capture(&self, device_id: Option<&str>) -> Result<Receiver<AudioChunk>, DomainError> {
        let (chunk_tx, chunk_rx) = unbounded();
        let (reply_tx, reply_rx) = bounded(1);

        self.cmd_tx
            .send(AudioCommand::Start {
                device_id: device_id.map(String::from),
                chunk_tx,
                reply: reply_tx,
            })
            .map_err(|_| DomainError::AudioDevice {
                message: "Audio thread not running".to_string(),
            })?;

        reply_rx
            .recv()
            .map_err(|_| DomainError::AudioDevice {
                message: "Audio thread did not respond".to_string(),
            })??;

        Ok(chunk_rx)
    }

    fn stop_capture(&self) -> Result<(), DomainError> {
        let (reply_tx, reply_rx) = bounded(1);

        self.cmd_tx
            .send(AudioCommand::Stop { reply: reply_tx })
            .map_err(|_| DomainError::AudioDevice {
                message: "Audio thread not running".to_string(),
            })?;

        reply_rx.recv().map_err(|_| DomainError::AudioDevice {
            message: "Audio thread did not respond".to_string(),
        })?
    }
}
