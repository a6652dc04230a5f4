//! Shared state observed by the window: the assistant's status and the
//! visible conversation log.
//!
//! Both handles are cheap to clone and safe to share across the listen
//! cycle, the speech worker and the UI thread.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// What the assistant is doing right now.
///
/// ```text
/// Idle ──trigger──▶ Listening ──phrase captured──▶ Thinking ──response queued──▶ Speaking
///  ▲                    │                              │                            │
///  └────────────────────┴───── timeout / error ────────┘        playback done / stop┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Status {
    #[default]
    Idle = 0,
    Listening = 1,
    Thinking = 2,
    Speaking = 3,
}

impl Status {
    /// Label shown in the window header.
    ///
    /// ```
    /// use loki_assistant::pipeline::Status;
    ///
    /// assert_eq!(Status::Idle.label(), "Idle");
    /// assert_eq!(Status::Thinking.label(), "Thinking");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            Status::Idle => "Idle",
            Status::Listening => "Listening",
            Status::Thinking => "Thinking",
            Status::Speaking => "Speaking",
        }
    }

    /// `true` while a listen cycle owns the status.
    pub fn in_cycle(&self) -> bool {
        matches!(self, Status::Listening | Status::Thinking)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Status::Listening,
            2 => Status::Thinking,
            3 => Status::Speaking,
            _ => Status::Idle,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// StatusModel
// ---------------------------------------------------------------------------

/// Lock-free holder of the current [`Status`].
///
/// Readers never block; [`transition`](Self::transition) lets a writer change
/// the value only if nobody else changed it first.
#[derive(Debug, Clone, Default)]
pub struct StatusModel {
    inner: Arc<AtomicU8>,
}

impl StatusModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Status {
        Status::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, status: Status) {
        let previous = Status::from_u8(self.inner.swap(status as u8, Ordering::AcqRel));
        if previous != status {
            log::debug!("status: {previous} → {status}");
        }
    }

    /// Set `to` only if the current value is `from`.  Returns whether the
    /// change happened.
    pub fn transition(&self, from: Status, to: Status) -> bool {
        let changed = self
            .inner
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if changed && from != to {
            log::debug!("status: {from} → {to}");
        }
        changed
    }

    /// End-of-cycle reset: `Listening`/`Thinking` become `Idle`, `Speaking`
    /// is left for the speech worker to clear.
    pub fn settle_after_cycle(&self) -> Status {
        let mut current = self.get();
        while current.in_cycle() {
            if self.transition(current, Status::Idle) {
                return Status::Idle;
            }
            current = self.get();
        }
        current
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One line of the visible log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub speaker: String,
    pub text: String,
}

/// Append-only conversation log shared with the window.
///
/// The lock is only held to push or copy entries.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    entries: Arc<Mutex<Vec<Message>>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, speaker: impl Into<String>, text: impl Into<String>) {
        let message = Message {
            speaker: speaker.into(),
            text: text.into(),
        };
        log::info!("{}: {}", message.speaker, message.text);
        self.lock().push(message);
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Entries appended since the first `from` ones.
    pub fn since(&self, from: usize) -> Vec<Message> {
        self.lock().iter().skip(from).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<Message> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
