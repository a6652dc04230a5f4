//! Spoken output.
//!
//! * [`SpeechSynthesizer`]: blocking speak/stop capability.
//! * [`CommandSynthesizer`]: platform speech program run as a child process.
//! * [`SilentSynthesizer`]: logs instead of speaking.
//! * [`SpeechOutputQueue`]: FIFO queue drained by the `speech-output` thread.

pub mod queue;
pub mod synth;

pub use queue::{SpeechJob, SpeechOutputQueue};
pub use synth::{
    platform_command, CommandSynthesizer, SilentSynthesizer, SpeechError, SpeechSynthesizer,
    TEXT_PLACEHOLDER,
};
