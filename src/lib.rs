//! Loki: a voice-driven desktop assistant.
//!
//! Speech is captured from the microphone, transcribed locally with Whisper,
//! classified into an app launch, a website visit or a question for Gemini,
//! acted upon, and the answer is spoken back.
//!
//! ```text
//! audio ─▶ stt ─▶ intent ─▶ dispatch ─▶ tts
//!                     ▲                  │
//!               pipeline (cycle + status)◀┘
//! ```

pub mod app;
pub mod audio;
pub mod config;
pub mod dispatch;
pub mod intent;
pub mod llm;
pub mod pipeline;
pub mod stt;
pub mod tts;
