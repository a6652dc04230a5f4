//! Application and browser launch capabilities.
//!
//! Both are fire-and-forget: the caller never waits for the child.  A
//! short-lived `launch-reaper` thread waits on each child so finished
//! processes do not linger as zombies.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use thiserror::Error;

/// Errors raised while starting a process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no command configured")]
    EmptyCommand,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Starts desktop applications.
pub trait AppLauncher: Send + Sync {
    /// Spawn `command[0]` with the remaining tokens as arguments.
    fn launch(&self, command: &[String]) -> Result<(), LaunchError>;

    /// Ask the platform to open something by name (no alias known).
    fn platform_open(&self, name: &str) -> Result<(), LaunchError>;
}

/// Opens URLs in the user's browser.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), LaunchError>;
}

// ---------------------------------------------------------------------------
// System implementations
// ---------------------------------------------------------------------------

/// Launcher backed by `std::process::Command`.
///
/// On Windows alias commands go through `cmd /C` so shell built-ins such as
/// `start ms-settings:` work.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl AppLauncher for SystemLauncher {
    fn launch(&self, command: &[String]) -> Result<(), LaunchError> {
        let (program, args) = command.split_first().ok_or(LaunchError::EmptyCommand)?;

        if cfg!(windows) {
            spawn_detached("cmd", ["/C"].iter().copied().chain(command.iter().map(String::as_str)))
        } else {
            spawn_detached(program, args.iter().map(String::as_str))
        }
    }

    fn platform_open(&self, name: &str) -> Result<(), LaunchError> {
        if cfg!(windows) {
            spawn_detached("cmd", ["/C", "start", "", name])
        } else if cfg!(target_os = "macos") {
            spawn_detached("open", ["-a", name])
        } else {
            spawn_detached("xdg-open", [name])
        }
    }
}

/// Browser opener using the platform URL handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), LaunchError> {
        if cfg!(windows) {
            spawn_detached("cmd", ["/C", "start", "", url])
        } else if cfg!(target_os = "macos") {
            spawn_detached("open", [url])
        } else {
            spawn_detached("xdg-open", [url])
        }
    }
}

fn spawn_detached<'a>(
    program: &str,
    args: impl IntoIterator<Item = &'a str>,
) -> Result<(), LaunchError> {
    log::debug!("launch: spawning {program}");
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if let Err(e) = reap(child, program) {
        log::warn!("launch: no reaper for {program}: {e}");
    }
    Ok(())
}

/// Wait for `child` on a background thread.  The handle yields the exit
/// status, or `None` if waiting failed.
fn reap(mut child: Child, program: &str) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    let program = program.to_string();
    std::thread::Builder::new()
        .name("launch-reaper".into())
        .spawn(move || match child.wait() {
            Ok(status) => {
                log::debug!("launch: {program} exited with {status}");
                Some(status)
            }
            Err(e) => {
                log::warn!("launch: waiting for {program} failed: {e}");
                None
            }
        })
}
