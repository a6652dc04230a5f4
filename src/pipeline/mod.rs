//! Listen cycle orchestration and the shared state it drives.
//!
//! * [`ListenCycleCoordinator`]: runs one capture → transcribe → resolve →
//!   dispatch → speak cycle at a time.
//! * [`StatusModel`]: lock-free current [`Status`], read by the window.
//! * [`Conversation`]: the visible message log.

pub mod runner;
pub mod state;

pub use runner::{
    CycleComponents, CycleError, CycleSettings, ListenCycleCoordinator, TriggerError,
    LISTEN_TIMEOUT, NOT_UNDERSTOOD, NO_MICROPHONE, USER_SPEAKER,
};
pub use state::{Conversation, Message, Status, StatusModel};
