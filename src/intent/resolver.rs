//! First-match-wins intent rules.
//!
//! ```text
//! 1. normalise      trim + lowercase
//! 2. verb command   "open …" / "launch …"
//!                     ├─ empty target              → AskAssistant(MissingTarget)
//!                     ├─ website-looking target     → OpenWebsite(target)
//!                     └─ otherwise                  → LaunchApplication(target)
//! 3. loose website  contains "open" AND looks like a website → OpenWebsite(text)
//! 4. fallback       AskAssistant(Text(original utterance))
//! ```
//!
//! "Looks like a website" means a whole-word `.com` / `.org` / `.net`
//! domain, the word "website", or a known site alias that is not shadowed
//! by an application alias ("google chrome" stays an application even
//! though it contains "google").

use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::aliases::AliasBook;

static WEBSITE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\.com\b|\b\.org\b|\b\.net\b|\bwebsite\b").expect("website pattern is valid")
});

const VERBS: [&str; 2] = ["open", "launch"];

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// What the assistant should hand to the conversational model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Forward this text verbatim.
    Text(String),
    /// The user said "open" / "launch" with nothing after it.  The model is
    /// not called; the user is asked to name a target instead.
    MissingTarget,
}

/// The classified meaning of one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Start a desktop application.  `name` is the normalised target.
    LaunchApplication { name: String },
    /// Open a website.  `target` is free text that still has to be matched
    /// against the site aliases or scanned for a URL.
    OpenWebsite { target: String },
    /// Anything else: a question for the conversational model.
    AskAssistant { query: Query },
}

/// `true` when the text names a `.com` / `.org` / `.net` domain or contains
/// the word "website".
pub fn looks_like_website(text: &str) -> bool {
    WEBSITE_HINT.is_match(text)
}

// ---------------------------------------------------------------------------
// IntentResolver
// ---------------------------------------------------------------------------

/// Maps recognised text to an [`Intent`].
///
/// Side-effect free; the same text always resolves to the same intent.
#[derive(Debug, Clone)]
pub struct IntentResolver {
    aliases: Arc<AliasBook>,
}

impl IntentResolver {
    pub fn new(aliases: Arc<AliasBook>) -> Self {
        Self { aliases }
    }

    pub fn resolve(&self, text: &str) -> Intent {
        let cleaned = text.trim().to_lowercase();

        if starts_with_verb(&cleaned) {
            return self.resolve_verb_command(&cleaned);
        }

        if cleaned.contains("open") && self.is_website(&cleaned) {
            return Intent::OpenWebsite { target: cleaned };
        }

        Intent::AskAssistant {
            query: Query::Text(text.to_string()),
        }
    }

    /// Strip the verb and classify what is left.
    ///
    /// Only the first occurrence is removed: "launch" is first rewritten to
    /// "open", then the first "open" is dropped, so "open open office" keeps
    /// its second "open".
    fn resolve_verb_command(&self, cleaned: &str) -> Intent {
        let target = cleaned
            .replacen("launch", "open", 1)
            .replacen("open", "", 1)
            .trim()
            .to_string();

        if target.is_empty() {
            return Intent::AskAssistant {
                query: Query::MissingTarget,
            };
        }

        if self.is_website(&target) {
            Intent::OpenWebsite { target }
        } else {
            Intent::LaunchApplication { name: target }
        }
    }

    fn is_website(&self, text: &str) -> bool {
        looks_like_website(text)
            || (!self.aliases.apps.contains_match(text) && self.aliases.sites.contains_match(text))
    }
}

impl Default for IntentResolver {
    fn default() -> Self {
        Self::new(Arc::new(AliasBook::default()))
    }
}

fn starts_with_verb(cleaned: &str) -> bool {
    cleaned
        .split_whitespace()
        .next()
        .is_some_and(|first| VERBS.contains(&first))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
