//! Microphone capture via `cpal`.
//!
//! [`Microphone`] opens the default input device for the length of one
//! listen, converts every callback buffer to 16 kHz mono and feeds it to a
//! [`PhraseDetector`] until a phrase completes or the timeout elapses.  The
//! cpal stream lives on the calling thread and is dropped before
//! [`AudioSource::capture`] returns, so the device is released between
//! listens.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::phrase::{PhraseDetector, PhraseEvent, PhraseParams};
use super::resample::Mono16k;
use super::SAMPLE_RATE;
use crate::config::AudioConfig;

/// Grace period on top of [`PhraseParams::max_duration`] before a stream
/// that stopped delivering buffers is abandoned.
const STALL_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// AudioChunk / AudioSample
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

/// One captured phrase: 16 kHz mono `f32` samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioSample {
    pub samples: Vec<f32>,
}

impl AudioSample {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / SAMPLE_RATE as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while listening.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported input sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// No speech began before the listen timeout.
    #[error("listening timed out")]
    Timeout,

    #[error("audio stream stopped delivering samples")]
    Stalled,
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// Blocking source of one spoken phrase.
///
/// Implementations block the calling thread; async callers wrap the call in
/// `tokio::task::spawn_blocking`.
pub trait AudioSource: Send + Sync {
    /// Wait up to `timeout` for speech to begin, then record until the
    /// speaker pauses or `phrase_limit` is reached.
    fn capture(&self, timeout: Duration, phrase_limit: Duration)
        -> Result<AudioSample, CaptureError>;
}

// ---------------------------------------------------------------------------
// Microphone
// ---------------------------------------------------------------------------

/// The system default input device.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use loki_assistant::audio::{AudioSource, Microphone};
/// use loki_assistant::config::AudioConfig;
///
/// let mic = Microphone::new(AudioConfig::default()).unwrap();
/// let phrase = mic.capture(Duration::from_secs(5), Duration::from_secs(12)).unwrap();
/// println!("captured {:?}", phrase.duration());
/// ```
#[derive(Debug, Clone)]
pub struct Microphone {
    config: AudioConfig,
    device_name: String,
}

impl Microphone {
    /// Probe the default input device.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or [`CaptureError::DefaultConfig`] when the device cannot report a
    /// default stream configuration.
    pub fn new(config: AudioConfig) -> Result<Self, CaptureError> {
        let device = default_device()?;
        let supported = device.default_input_config()?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".into());

        log::info!(
            "capture: using '{device_name}' ({} Hz, {} ch, {:?})",
            supported.sample_rate().0,
            supported.channels(),
            supported.sample_format()
        );

        Ok(Self {
            config,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn open_stream(
        &self,
        tx: mpsc::Sender<AudioChunk>,
    ) -> Result<cpal::Stream, CaptureError> {
        let device = default_device()?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let stream = match format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Receiver may already be gone once the phrase completed.
                    let _ = tx.send(AudioChunk {
                        samples: data.to_vec(),
                        sample_rate,
                        channels,
                    });
                },
                log_stream_error,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(AudioChunk {
                        samples: data.iter().map(|&s| s as f32 / i16::MAX as f32).collect(),
                        sample_rate,
                        channels,
                    });
                },
                log_stream_error,
                None,
            )?,
            other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
        };

        stream.play()?;
        Ok(stream)
    }
}

impl AudioSource for Microphone {
    fn capture(
        &self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<AudioSample, CaptureError> {
        let params = PhraseParams::from_config(&self.config, timeout, phrase_limit);
        let deadline = Instant::now() + params.max_duration() + STALL_GRACE;
        let mut detector = PhraseDetector::new(params);
        let mut mono = Mono16k::new();

        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let _stream = self.open_stream(tx)?;
        log::debug!("capture: listening (timeout {timeout:?}, limit {phrase_limit:?})");

        loop {
            match rx.recv_timeout(Duration::from_millis(250)) {
                Ok(chunk) => match detector.push(&mono.convert(&chunk)) {
                    PhraseEvent::Pending => {}
                    PhraseEvent::Complete(sample) => {
                        log::debug!("capture: phrase of {:?}", sample.duration());
                        return Ok(sample);
                    }
                    PhraseEvent::TimedOut => return Err(CaptureError::Timeout),
                },
                Err(RecvTimeoutError::Timeout) if Instant::now() < deadline => {}
                Err(_) => return Err(CaptureError::Stalled),
            }
        }
    }
}

fn default_device() -> Result<cpal::Device, CaptureError> {
    cpal::default_host()
        .default_input_device()
        .ok_or(CaptureError::NoDevice)
}

fn log_stream_error(err: cpal::StreamError) {
    log::error!("cpal stream error: {err}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Captured audio crosses from the blocking pool into the async cycle.
    #[test]
    fn audio_types_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
        assert_send::<AudioSample>();
        assert_send::<CaptureError>();
    }

    #[test]
    fn microphone_is_shareable() {
        fn assert_source<T: AudioSource + 'static>() {}
        assert_source::<Microphone>();
    }

    #[test]
    fn sample_duration_at_16k() {
        let one_second = AudioSample::new(vec![0.0; 16_000]);
        assert_eq!(one_second.duration(), Duration::from_secs(1));
        assert!(AudioSample::default().is_empty());
    }

    #[test]
    fn timeout_message() {
        assert_eq!(CaptureError::Timeout.to_string(), "listening timed out");
    }
}
