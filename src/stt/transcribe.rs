//! Transcription parameters and transcript clean-up.

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// Settings for a single Whisper inference run.
///
/// ```
/// use loki_assistant::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "de".into(),
///     ..TranscribeParams::default()
/// };
/// assert_eq!(params.best_of, 1);
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 language code, or `"auto"` for Whisper's detection.
    pub language: String,
    /// Greedy decoding candidates per step.  1 is fastest.
    pub best_of: i32,
    /// CPU threads handed to Whisper.
    pub n_threads: i32,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            best_of: 1,
            n_threads: optimal_threads(),
        }
    }
}

/// Available parallelism capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// Transcript clean-up
// ---------------------------------------------------------------------------

/// Join Whisper segments, dropping non-speech annotations such as
/// `[BLANK_AUDIO]`, `(wind blowing)` or `[Music]`.
///
/// Returns an empty string when nothing but annotations was produced.
pub fn clean_transcript<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_annotation(s))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_annotation(segment: &str) -> bool {
    (segment.starts_with('[') && segment.ends_with(']'))
        || (segment.starts_with('(') && segment.ends_with(')'))
        || segment.chars().all(|c| !c.is_alphanumeric())
}
