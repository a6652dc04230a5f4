//! Action dispatch: turns an [`Intent`](crate::intent::Intent) into a side
//! effect and a sentence to say.
//!
//! * [`ActionDispatcher`]: per-intent execution and response phrasing.
//! * [`AppLauncher`] / [`BrowserOpener`]: process-launch capabilities, with
//!   [`SystemLauncher`] / [`SystemBrowser`] as the real implementations.

pub mod dispatcher;
pub mod launcher;

pub use dispatcher::{
    extract_url, ActionDispatcher, ActionResult, SideEffect, EMPTY_ANSWER, LLM_NOT_CONFIGURED,
    MISSING_TARGET, NO_WEBSITE,
};
pub use launcher::{AppLauncher, BrowserOpener, LaunchError, SystemBrowser, SystemLauncher};
