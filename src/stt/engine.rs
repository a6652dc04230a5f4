//! Core STT engine trait and implementations.
//!
//! [`SttEngine`] is the interface the listen cycle uses.  It is object-safe
//! and `Send + Sync` so it can be held behind an `Arc<dyn SttEngine>`.
//!
//! [`WhisperEngine`] wraps a `whisper_rs::WhisperContext`; construct it with
//! [`WhisperEngine::load`].  [`UnavailableStt`] stands in when no model could
//! be loaded, so a listen still completes with a service error instead of
//! the app refusing to start.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::{AudioSample, SAMPLE_RATE};
use crate::stt::transcribe::{clean_transcript, TranscribeParams};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// Audio was captured but contained no recognisable speech.
    #[error("speech was not recognised")]
    NoMatch,

    /// The recogniser itself failed.
    #[error("{0}")]
    Service(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Blocking speech-to-text.
///
/// `audio` is 16 kHz mono.  Implementations return [`SttError::NoMatch`] when
/// nothing intelligible was said, and never an empty `Ok` string.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &AudioSample) -> Result<String, SttError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SttEngine>) {}
};

/// Phrases shorter than this are treated as clicks or breaths.
const MIN_AUDIO_SAMPLES: usize = SAMPLE_RATE as usize / 4;

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Local Whisper inference.
///
/// A new `WhisperState` is created for every call so the engine can be
/// shared across threads without locking.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the model
// weights are read-only after loading.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`]: `model_path` does not exist.
    /// - [`SttError::ContextInit`]: whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded {}", path.display());
        Ok(Self { ctx, params })
    }

    fn segments(&self, audio: &[f32]) -> Result<Vec<String>, SttError> {
        let mut fp = FullParams::new(SamplingStrategy::Greedy {
            best_of: self.params.best_of,
        });
        let lang = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        state
            .full(fp, audio)
            .map_err(|e| SttError::Service(format!("transcription failed: {e}")))?;

        let n = state
            .full_n_segments()
            .map_err(|e| SttError::Service(e.to_string()))?;

        (0..n)
            .map(|i| {
                state
                    .full_get_segment_text(i)
                    .map_err(|e| SttError::Service(format!("segment {i}: {e}")))
            })
            .collect()
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &AudioSample) -> Result<String, SttError> {
        if audio.samples.len() < MIN_AUDIO_SAMPLES {
            return Err(SttError::NoMatch);
        }

        let started = std::time::Instant::now();
        let segments = self.segments(&audio.samples)?;
        let text = clean_transcript(segments.iter().map(String::as_str));
        log::debug!(
            "stt: {:?} of audio in {:?} → {} chars",
            audio.duration(),
            started.elapsed(),
            text.len()
        );

        if text.is_empty() {
            Err(SttError::NoMatch)
        } else {
            Ok(text)
        }
    }
}

// ---------------------------------------------------------------------------
// UnavailableStt
// ---------------------------------------------------------------------------

/// Recogniser used when no model could be loaded.  Every call fails with a
/// service error carrying the load failure.
#[derive(Debug, Clone)]
pub struct UnavailableStt {
    reason: String,
}

impl UnavailableStt {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SttEngine for UnavailableStt {
    fn transcribe(&self, _audio: &AudioSample) -> Result<String, SttError> {
        Err(SttError::Service(self.reason.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Returns a pre-configured response without loading a model.
#[cfg(test)]
pub struct MockSttEngine {
    response: Result<String, SttError>,
}

#[cfg(test)]
impl MockSttEngine {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, _audio: &AudioSample) -> Result<String, SttError> {
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
