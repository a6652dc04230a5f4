//! Intent resolution: maps a recognised utterance to what the user wants.
//!
//! Resolution is pure and total: every utterance resolves to exactly one
//! [`Intent`], falling back to [`Intent::AskAssistant`] when nothing
//! structural matches.
//!
//! ```
//! use loki_assistant::intent::{Intent, IntentResolver};
//!
//! let resolver = IntentResolver::default();
//! assert_eq!(
//!     resolver.resolve("Launch Notepad"),
//!     Intent::LaunchApplication { name: "notepad".into() }
//! );
//! assert_eq!(
//!     resolver.resolve("open youtube"),
//!     Intent::OpenWebsite { target: "youtube".into() }
//! );
//! ```

pub mod aliases;
pub mod resolver;

pub use aliases::{AliasBook, AliasTable};
pub use resolver::{looks_like_website, Intent, IntentResolver, Query};
