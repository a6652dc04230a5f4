//! Speech synthesis backends.
//!
//! [`CommandSynthesizer`] runs the platform's speech program as a child
//! process and blocks until it exits.  [`SpeechSynthesizer::stop`] kills the
//! running child, which makes the blocked `speak` call return early.

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::config::SpeechConfig;

/// Placeholder replaced by the utterance in a configured command.
pub const TEXT_PLACEHOLDER: &str = "{text}";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("no speech command configured")]
    EmptyCommand,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("speech process I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Blocking text-to-speech.
///
/// `speak` returns once the utterance has finished playing or was cut short
/// by `stop`.  `stop` may be called from any thread while `speak` is
/// blocked; with nothing playing it is a no-op.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), SpeechError>;
    fn stop(&self) -> Result<(), SpeechError>;
}

// ---------------------------------------------------------------------------
// CommandSynthesizer
// ---------------------------------------------------------------------------

/// Speaks by running an external program once per utterance.
///
/// Every `{text}` in the arguments is replaced by the utterance; without a
/// placeholder the utterance is appended as the last argument.  A
/// placeholder embedded inside a longer argument is assumed to sit in a
/// single-quoted PowerShell string, so `'` is doubled there.
///
/// ```rust
/// use loki_assistant::tts::CommandSynthesizer;
///
/// let synth = CommandSynthesizer::new(vec!["espeak-ng".into(), "-s".into(), "175".into()]).unwrap();
/// assert_eq!(synth.args_for("hello"), ["-s", "175", "hello"]);
/// ```
#[derive(Debug)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSynthesizer {
    /// `command[0]` is the program, the rest its arguments.
    pub fn new(command: Vec<String>) -> Result<Self, SpeechError> {
        let mut tokens = command.into_iter();
        let program = tokens
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or(SpeechError::EmptyCommand)?;

        Ok(Self {
            program,
            args: tokens.collect(),
            current: Mutex::new(None),
        })
    }

    /// Use the configured program if any, else the first platform speech
    /// program found on `PATH`.
    pub fn from_config(config: &SpeechConfig) -> Option<Self> {
        match &config.program {
            Some(command) => match Self::new(command.clone()) {
                Ok(synth) => Some(synth),
                Err(e) => {
                    log::warn!("speech: ignoring configured program: {e}");
                    platform_command(config.rate_wpm).and_then(|c| Self::new(c).ok())
                }
            },
            None => platform_command(config.rate_wpm).and_then(|c| Self::new(c).ok()),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args_for(&self, text: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg == TEXT_PLACEHOLDER {
                    substituted = true;
                    text.to_string()
                } else if arg.contains(TEXT_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(TEXT_PLACEHOLDER, &text.replace('\'', "''"))
                } else {
                    arg.clone()
                }
            })
            .collect();

        if !substituted {
            args.push(text.to_string());
        }
        args
    }

    /// Spawn the program for `text` and register it as the current child in
    /// one critical section, so a stop() never misses it.
    fn start(&self, text: &str) -> Result<(), SpeechError> {
        let mut current = self.lock();
        let child = Command::new(&self.program)
            .args(self.args_for(text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        *current = Some(child);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.start(text)?;

        // Poll instead of wait() so stop() can take the child out from
        // under us; the lock is released between polls.
        loop {
            {
                let mut guard = self.lock();
                let Some(child) = guard.as_mut() else {
                    // stop() took it.
                    return Ok(());
                };
                if let Some(status) = child.try_wait()? {
                    guard.take();
                    return if status.success() {
                        Ok(())
                    } else {
                        Err(SpeechError::Failed {
                            program: self.program.clone(),
                            status,
                        })
                    };
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop(&self) -> Result<(), SpeechError> {
        let taken = self.lock().take();
        if let Some(mut child) = taken {
            log::debug!("speech: stopping {}", self.program);
            child.kill()?;
            child.wait()?;
        }
        Ok(())
    }
}

/// Speech program for this platform, if one is installed.
pub fn platform_command(rate_wpm: u32) -> Option<Vec<String>> {
    let rate = rate_wpm.to_string();

    if cfg!(target_os = "windows") {
        let script = "Add-Type -AssemblyName System.Speech; \
             (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{text}')";
        return Some(vec![
            "powershell".into(),
            "-NoProfile".into(),
            "-Command".into(),
            script.into(),
        ]);
    }

    if cfg!(target_os = "macos") {
        return Some(vec!["say".into(), "-r".into(), rate]);
    }

    ["espeak-ng", "espeak"]
        .into_iter()
        .find(|program| which::which(program).is_ok())
        .map(|program| vec![program.to_string(), "-s".into(), rate])
}

// ---------------------------------------------------------------------------
// SilentSynthesizer
// ---------------------------------------------------------------------------

/// Fallback when no speech program is available: logs instead of speaking.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSynthesizer;

impl SpeechSynthesizer for SilentSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        log::info!("speech (silent): {text}");
        Ok(())
    }

    fn stop(&self) -> Result<(), SpeechError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn synth(tokens: &[&str]) -> CommandSynthesizer {
        CommandSynthesizer::new(tokens.iter().map(|t| t.to_string()).collect()).unwrap()
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            CommandSynthesizer::new(vec![]),
            Err(SpeechError::EmptyCommand)
        ));
        assert!(matches!(
            CommandSynthesizer::new(vec!["  ".into()]),
            Err(SpeechError::EmptyCommand)
        ));
    }

    #[test]
    fn text_appended_without_placeholder() {
        assert_eq!(synth(&["say", "-r", "175"]).args_for("hi there"), ["-r", "175", "hi there"]);
    }

    #[test]
    fn standalone_placeholder_is_replaced_verbatim() {
        let s = synth(&["tts", "--text", "{text}", "--fast"]);
        assert_eq!(s.args_for("it's"), ["--text", "it's", "--fast"]);
    }

    #[test]
    fn embedded_placeholder_doubles_single_quotes() {
        let s = synth(&["powershell", "-Command", "Speak('{text}')"]);
        assert_eq!(s.args_for("it's done"), ["-Command", "Speak('it''s done')"]);
    }

    #[test]
    fn configured_program_wins() {
        let config = SpeechConfig {
            program: Some(vec!["my-tts".into(), "{text}".into()]),
            ..SpeechConfig::default()
        };
        let s = CommandSynthesizer::from_config(&config).unwrap();
        assert_eq!(s.program(), "my-tts");
    }

    #[test]
    fn stop_with_nothing_playing_is_ok() {
        assert!(synth(&["say"]).stop().is_ok());
        assert!(SilentSynthesizer.stop().is_ok());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let s = synth(&["definitely-not-a-speech-program-xyz"]);
        assert!(matches!(s.speak("hello"), Err(SpeechError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn speak_waits_for_child_and_reports_failure() {
        assert!(synth(&["true"]).speak("ignored").is_ok());
        assert!(matches!(
            synth(&["false"]).speak("ignored"),
            Err(SpeechError::Failed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn stop_right_after_start_kills_the_child() {
        use std::time::Instant;

        let s = synth(&["sleep", "{text}"]);
        s.start("5").unwrap();
        assert!(s.lock().is_some());

        let started = Instant::now();
        s.stop().unwrap();
        assert!(s.lock().is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn stop_interrupts_running_speech() {
        use std::sync::Arc;
        use std::time::Instant;

        // `sleep 5` stands in for a long utterance.
        let s = Arc::new(synth(&["sleep", "{text}"]));
        let speaker = {
            let s = Arc::clone(&s);
            std::thread::spawn(move || s.speak("5"))
        };

        let started = Instant::now();
        std::thread::sleep(Duration::from_millis(200));
        s.stop().unwrap();
        assert!(speaker.join().unwrap().is_ok());
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
