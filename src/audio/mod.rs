//! Audio input: microphone capture → 16 kHz mono → phrase detection.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → Mono16k
//!           → PhraseDetector (calibrate, wait, record) → AudioSample
//! ```
//!
//! [`AudioSource`] is the seam the listen cycle depends on; [`Microphone`]
//! is the real device.

pub mod capture;
pub mod phrase;
pub mod resample;
pub mod vad;

/// Sample rate of every [`AudioSample`], as Whisper expects.
pub const SAMPLE_RATE: u32 = 16_000;

pub use capture::{AudioChunk, AudioSample, AudioSource, CaptureError, Microphone};
pub use phrase::{PhraseDetector, PhraseEvent, PhraseParams, FRAME_LEN};
pub use resample::{downmix, Mono16k, StreamResampler};
pub use vad::{rms, VadDetector};
