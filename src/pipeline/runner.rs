//! Listen cycle coordinator: drives one capture → transcribe → resolve →
//! dispatch → speak pass per trigger.
//!
//! # Cycle flow
//!
//! ```text
//! trigger()                                   [Idle → Listening]
//!   └─▶ spawn supervisor
//!         └─▶ spawn run_cycle
//!               ├─ spawn_blocking(mic.capture)   timeout ─▶ "Listening timed out…"
//!               │                                            [Listening → Thinking]
//!               ├─ spawn_blocking(stt.transcribe) no match ─▶ "I couldn't understand…"
//!               │                                 failure  ─▶ "Speech service error…"
//!               ├─ history += You: text
//!               ├─ resolver.resolve → dispatcher.dispatch (async)
//!               ├─ history += Loki: response
//!               └─ speech.enqueue(response)                  [→ Speaking]
//!         └─▶ error / panic ─▶ history += message
//!         └─▶ settle: Listening | Thinking → Idle
//! ```
//!
//! Blocking work (audio capture, Whisper inference) runs on
//! `tokio::task::spawn_blocking` so neither the runtime nor the UI thread
//! stalls.  The supervisor guarantees the status never stays in `Listening`
//! or `Thinking` after a cycle, whatever happened inside it.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

use crate::audio::{AudioSource, CaptureError};
use crate::config::AudioConfig;
use crate::dispatch::ActionDispatcher;
use crate::intent::IntentResolver;
use crate::stt::{SttEngine, SttError};
use crate::tts::SpeechOutputQueue;

use super::state::{Conversation, Status, StatusModel};

/// Speaker label for recognised utterances.
pub const USER_SPEAKER: &str = "You";

pub const NO_MICROPHONE: &str = "Microphone not available. Check your setup and restart.";
pub const LISTEN_TIMEOUT: &str = "Listening timed out. Please try again.";
pub const NOT_UNDERSTOOD: &str = "I couldn't understand that. Try again.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// How a cycle ended early.  Each variant maps to one user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("microphone not available")]
    Unavailable,

    #[error("no speech before the listen timeout")]
    Timeout,

    #[error("speech was not recognised")]
    NoMatch,

    #[error("transcription service failed: {0}")]
    Service(String),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl CycleError {
    /// Text appended to the conversation for this failure.
    ///
    /// ```
    /// use loki_assistant::pipeline::CycleError;
    ///
    /// assert_eq!(
    ///     CycleError::Service("quota exceeded".into()).user_message(),
    ///     "Speech service error: quota exceeded."
    /// );
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            CycleError::Unavailable => NO_MICROPHONE.to_string(),
            CycleError::Timeout => LISTEN_TIMEOUT.to_string(),
            CycleError::NoMatch => NOT_UNDERSTOOD.to_string(),
            CycleError::Service(e) => format!("Speech service error: {e}."),
            CycleError::Unexpected(e) => format!("Unexpected error: {e}"),
        }
    }
}

impl From<CaptureError> for CycleError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Timeout => CycleError::Timeout,
            other => CycleError::Unexpected(other.to_string()),
        }
    }
}

impl From<SttError> for CycleError {
    fn from(e: SttError) -> Self {
        match e {
            SttError::NoMatch => CycleError::NoMatch,
            other => CycleError::Service(other.to_string()),
        }
    }
}

impl From<JoinError> for CycleError {
    fn from(e: JoinError) -> Self {
        CycleError::Unexpected(join_error_message(e))
    }
}

/// Why [`ListenCycleCoordinator::trigger`] refused to start a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("microphone not available")]
    NoMicrophone,

    #[error("assistant is busy ({0})")]
    Busy(Status),
}

// ---------------------------------------------------------------------------
// ListenCycleCoordinator
// ---------------------------------------------------------------------------

/// Capture limits for one listen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSettings {
    pub listen_timeout: Duration,
    pub phrase_limit: Duration,
}

impl CycleSettings {
    /// Out-of-range values (negative, non-finite or too large) fall back to
    /// the built-in defaults.
    pub fn from_config(audio: &AudioConfig) -> Self {
        let defaults = AudioConfig::default();
        Self {
            listen_timeout: secs_or(audio.listen_timeout_secs, defaults.listen_timeout_secs),
            phrase_limit: secs_or(audio.phrase_time_limit_secs, defaults.phrase_time_limit_secs),
        }
    }
}

fn secs_or(value: f32, fallback: f32) -> Duration {
    if value.is_finite() && value >= 0.0 {
        if let Ok(d) = Duration::try_from_secs_f32(value) {
            return d;
        }
    }
    log::warn!("cycle: ignoring duration {value}s, using {fallback}s");
    Duration::try_from_secs_f32(fallback).unwrap_or_default()
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

/// Everything a cycle talks to.
pub struct CycleComponents {
    pub status: StatusModel,
    pub history: Conversation,
    /// Display name used for the assistant's history entries.
    pub assistant_name: String,
    /// `None` when no input device could be opened at startup.
    pub microphone: Option<Arc<dyn AudioSource>>,
    pub stt: Arc<dyn SttEngine>,
    pub resolver: IntentResolver,
    pub dispatcher: ActionDispatcher,
    pub speech: Arc<SpeechOutputQueue>,
    pub settings: CycleSettings,
}

struct CycleContext {
    parts: CycleComponents,
    /// Set from trigger until the supervisor has settled the status.
    active: AtomicBool,
}

/// Runs at most one listen cycle at a time on the given runtime.
///
/// [`trigger`](Self::trigger) is cheap and non-blocking, so the UI thread
/// can call it directly from a button handler.
#[derive(Clone)]
pub struct ListenCycleCoordinator {
    ctx: Arc<CycleContext>,
    runtime: Handle,
}

impl ListenCycleCoordinator {
    pub fn new(parts: CycleComponents, runtime: Handle) -> Self {
        Self {
            ctx: Arc::new(CycleContext {
                parts,
                active: AtomicBool::new(false),
            }),
            runtime,
        }
    }

    pub fn status(&self) -> &StatusModel {
        &self.ctx.parts.status
    }

    pub fn history(&self) -> &Conversation {
        &self.ctx.parts.history
    }

    pub fn speech(&self) -> &Arc<SpeechOutputQueue> {
        &self.ctx.parts.speech
    }

    pub fn has_microphone(&self) -> bool {
        self.ctx.parts.microphone.is_some()
    }

    /// Start a cycle if the assistant is idle.
    ///
    /// Without a microphone the "not available" message is appended and no
    /// cycle starts.  While any status other than `Idle` is showing the
    /// trigger is rejected.  The returned handle resolves once the cycle has
    /// fully settled.
    pub fn trigger(&self) -> Result<JoinHandle<()>, TriggerError> {
        let parts = &self.ctx.parts;

        if parts.microphone.is_none() {
            parts.history.push(&parts.assistant_name, NO_MICROPHONE);
            return Err(TriggerError::NoMicrophone);
        }

        if self
            .ctx
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("cycle: trigger ignored, cycle still running");
            return Err(TriggerError::Busy(parts.status.get()));
        }

        if !parts.status.transition(Status::Idle, Status::Listening) {
            self.ctx.active.store(false, Ordering::Release);
            let current = parts.status.get();
            log::debug!("cycle: trigger ignored while {current}");
            return Err(TriggerError::Busy(current));
        }

        log::debug!("cycle: started");
        let ctx = Arc::clone(&self.ctx);
        Ok(self.runtime.spawn(supervise(ctx)))
    }
}

async fn supervise(ctx: Arc<CycleContext>) {
    let outcome = match tokio::spawn(run_cycle(Arc::clone(&ctx))).await {
        Ok(result) => result,
        Err(e) => Err(CycleError::from(e)),
    };

    let parts = &ctx.parts;
    if let Err(e) = outcome {
        log::warn!("cycle: {e}");
        parts.history.push(&parts.assistant_name, e.user_message());
    }

    let status = parts.status.settle_after_cycle();
    ctx.active.store(false, Ordering::Release);
    log::debug!("cycle: finished, status {status}");
}

async fn run_cycle(ctx: Arc<CycleContext>) -> Result<(), CycleError> {
    let parts = &ctx.parts;
    let mic = parts.microphone.clone().ok_or(CycleError::Unavailable)?;
    let CycleSettings {
        listen_timeout,
        phrase_limit,
    } = parts.settings;

    let audio =
        tokio::task::spawn_blocking(move || mic.capture(listen_timeout, phrase_limit)).await??;

    parts.status.transition(Status::Listening, Status::Thinking);

    let stt = Arc::clone(&parts.stt);
    let text = tokio::task::spawn_blocking(move || stt.transcribe(&audio)).await??;
    parts.history.push(USER_SPEAKER, text.as_str());

    let intent = parts.resolver.resolve(&text);
    log::debug!("cycle: resolved {intent:?}");
    let result = parts.dispatcher.dispatch(intent).await;
    log::debug!("cycle: dispatch effect {:?}", result.effect);

    parts
        .history
        .push(&parts.assistant_name, result.response.as_str());
    parts.speech.enqueue(result.response);
    Ok(())
}

fn join_error_message(e: JoinError) -> String {
    if e.is_panic() {
        panic_message(e.into_panic())
    } else {
        e.to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "panic".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
