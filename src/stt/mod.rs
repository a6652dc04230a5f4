//! Speech-to-text.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use loki_assistant::audio::AudioSample;
//! use loki_assistant::stt::{SttEngine, TranscribeParams, WhisperEngine};
//!
//! let engine = WhisperEngine::load("models/ggml-base.en.bin", TranscribeParams::default())
//!     .expect("model not found");
//!
//! // 16 kHz mono from the audio module
//! let phrase = AudioSample::new(vec![0.0; 16_000]);
//! match engine.transcribe(&phrase) {
//!     Ok(text) => println!("{text}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod engine;
pub mod transcribe;

pub use engine::{SttEngine, SttError, UnavailableStt, WhisperEngine};
pub use transcribe::{clean_transcript, TranscribeParams};

#[cfg(test)]
pub use engine::MockSttEngine;
