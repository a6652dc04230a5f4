//! Executes a resolved [`Intent`] and phrases the outcome for the user.
//!
//! Every path returns exactly one response string and performs at most one
//! external side effect.  Failures are folded into the response; nothing is
//! retried and nothing propagates.
//!
//! ```text
//! LaunchApplication ─▶ app alias? ─yes─▶ launcher.launch(cmd)
//!                                 └no──▶ launcher.platform_open(name)
//! OpenWebsite       ─▶ site alias? ─yes─▶ browser.open(alias url)
//!                                  └no──▶ URL in text? ─yes─▶ browser.open(url)
//!                                                      └no──▶ "couldn't detect"
//! AskAssistant      ─▶ MissingTarget ─▶ "Tell me what you'd like to open."
//!                   ─▶ no client     ─▶ "LLM is not configured…"
//!                   ─▶ client.complete(preamble + query)
//! ```

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::intent::{AliasBook, Intent, Query};
use crate::llm::{AssistantClient, LlmError, PromptBuilder};

use super::launcher::{AppLauncher, BrowserOpener};

/// `http(s)://…` up to whitespace, or `word.com` / `word.org` / `word.net`.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://\S+|\b\w+\.(?:com|org|net)\b").expect("url pattern is valid")
});

pub const MISSING_TARGET: &str = "Tell me what you'd like to open.";
pub const NO_WEBSITE: &str = "I couldn't detect a website. Please specify the site name or URL.";
pub const LLM_NOT_CONFIGURED: &str =
    "LLM is not configured. Please add a GEMINI_API_KEY to continue.";
pub const EMPTY_ANSWER: &str = "I didn't get a response.";

// ---------------------------------------------------------------------------
// ActionResult
// ---------------------------------------------------------------------------

/// The side effect a dispatch performed, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    None,
    /// An alias command or platform open was spawned.
    AppLaunched,
    /// The browser was pointed at this URL.
    BrowserOpened(String),
    /// A request was sent to the conversational model.
    AssistantQueried,
}

/// User-facing response plus the effect already performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub response: String,
    pub effect: SideEffect,
}

impl ActionResult {
    fn new(response: impl Into<String>, effect: SideEffect) -> Self {
        Self {
            response: response.into(),
            effect,
        }
    }
}

// ---------------------------------------------------------------------------
// ActionDispatcher
// ---------------------------------------------------------------------------

pub struct ActionDispatcher {
    aliases: Arc<AliasBook>,
    launcher: Arc<dyn AppLauncher>,
    browser: Arc<dyn BrowserOpener>,
    assistant: Option<Arc<dyn AssistantClient>>,
    prompt: PromptBuilder,
}

impl ActionDispatcher {
    /// `assistant` is `None` when no credential was supplied.
    pub fn new(
        aliases: Arc<AliasBook>,
        launcher: Arc<dyn AppLauncher>,
        browser: Arc<dyn BrowserOpener>,
        assistant: Option<Arc<dyn AssistantClient>>,
        prompt: PromptBuilder,
    ) -> Self {
        Self {
            aliases,
            launcher,
            browser,
            assistant,
            prompt,
        }
    }

    pub async fn dispatch(&self, intent: Intent) -> ActionResult {
        match intent {
            Intent::LaunchApplication { name } => self.open_application(&name),
            Intent::OpenWebsite { target } => self.open_website(&target),
            Intent::AskAssistant {
                query: Query::MissingTarget,
            } => ActionResult::new(MISSING_TARGET, SideEffect::None),
            Intent::AskAssistant {
                query: Query::Text(text),
            } => self.ask(&text).await,
        }
    }

    fn open_application(&self, name: &str) -> ActionResult {
        let outcome = match self.aliases.apps.first_match(name) {
            Some((alias, command)) => {
                log::debug!("dispatch: app alias {alias:?} → {command:?}");
                self.launcher.launch(command)
            }
            None => {
                log::debug!("dispatch: no app alias for {name:?}, using platform open");
                self.launcher.platform_open(name)
            }
        };

        match outcome {
            Ok(()) => ActionResult::new(format!("Opening {name}."), SideEffect::AppLaunched),
            Err(e) => {
                log::warn!("dispatch: launching {name:?} failed: {e}");
                ActionResult::new(format!("Couldn't open {name}: {e}."), SideEffect::None)
            }
        }
    }

    fn open_website(&self, text: &str) -> ActionResult {
        if let Some((alias, url)) = self.aliases.sites.first_match(text) {
            return self.browse(url, alias);
        }

        match extract_url(text) {
            Some(url) => {
                let label = url.clone();
                self.browse(&url, &label)
            }
            None => ActionResult::new(NO_WEBSITE, SideEffect::None),
        }
    }

    fn browse(&self, url: &str, label: &str) -> ActionResult {
        match self.browser.open(url) {
            Ok(()) => ActionResult::new(
                format!("Opening {label}."),
                SideEffect::BrowserOpened(url.to_string()),
            ),
            Err(e) => {
                log::warn!("dispatch: opening {url} failed: {e}");
                ActionResult::new(format!("Couldn't open {label}: {e}."), SideEffect::None)
            }
        }
    }

    async fn ask(&self, query: &str) -> ActionResult {
        let Some(assistant) = &self.assistant else {
            return ActionResult::new(LLM_NOT_CONFIGURED, SideEffect::None);
        };

        let prompt = self.prompt.build(query);
        let response = match assistant.complete(&prompt).await {
            Ok(text) if text.trim().is_empty() => EMPTY_ANSWER.to_string(),
            Ok(text) => text.trim().to_string(),
            Err(LlmError::EmptyResponse) => EMPTY_ANSWER.to_string(),
            Err(e) => {
                log::warn!("dispatch: assistant request failed: {e}");
                format!("LLM error: {e}.")
            }
        };
        ActionResult::new(response, SideEffect::AssistantQueried)
    }
}

/// Find a URL-like substring and make sure it carries a scheme.
pub fn extract_url(text: &str) -> Option<String> {
    let found = URL_PATTERN.find(text)?.as_str();
    if found.starts_with("http") {
        Some(found.to_string())
    } else {
        Some(format!("https://{found}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::launcher::LaunchError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<Vec<String>>>,
        opened: Mutex<Vec<String>>,
        fail: bool,
    }

    impl AppLauncher for RecordingLauncher {
        fn launch(&self, command: &[String]) -> Result<(), LaunchError> {
            if self.fail {
                return Err(LaunchError::EmptyCommand);
            }
            self.launched.lock().unwrap().push(command.to_vec());
            Ok(())
        }

        fn platform_open(&self, name: &str) -> Result<(), LaunchError> {
            if self.fail {
                return Err(LaunchError::Spawn {
                    program: "xdg-open".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            self.opened.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBrowser {
        urls: Mutex<Vec<String>>,
    }

    impl BrowserOpener for RecordingBrowser {
        fn open(&self, url: &str) -> Result<(), LaunchError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    struct ScriptedAssistant {
        reply: fn() -> Result<String, LlmError>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AssistantClient for ScriptedAssistant {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.reply)()
        }
    }

    struct Harness {
        launcher: Arc<RecordingLauncher>,
        browser: Arc<RecordingBrowser>,
        assistant: Option<Arc<ScriptedAssistant>>,
        dispatcher: ActionDispatcher,
    }

    fn harness(launcher: RecordingLauncher, reply: Option<fn() -> Result<String, LlmError>>) -> Harness {
        let launcher = Arc::new(launcher);
        let browser = Arc::new(RecordingBrowser::default());
        let assistant = reply.map(|reply| {
            Arc::new(ScriptedAssistant {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        });
        let dispatcher = ActionDispatcher::new(
            Arc::new(AliasBook::default()),
            launcher.clone(),
            browser.clone(),
            assistant
                .clone()
                .map(|a| a as Arc<dyn AssistantClient>),
            PromptBuilder::new("Loki"),
        );
        Harness {
            launcher,
            browser,
            assistant,
            dispatcher,
        }
    }

    fn launch(name: &str) -> Intent {
        Intent::LaunchApplication { name: name.into() }
    }

    fn website(target: &str) -> Intent {
        Intent::OpenWebsite {
            target: target.into(),
        }
    }

    fn ask(text: &str) -> Intent {
        Intent::AskAssistant {
            query: Query::Text(text.into()),
        }
    }

    // -----------------------------------------------------------------------
    // LaunchApplication
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn app_alias_launches_mapped_command() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h.dispatcher.dispatch(launch("notepad")).await;

        assert_eq!(result.response, "Opening notepad.");
        assert_eq!(result.effect, SideEffect::AppLaunched);
        assert_eq!(*h.launcher.launched.lock().unwrap(), vec![vec!["notepad".to_string()]]);
        assert!(h.launcher.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_app_alias_wins() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h.dispatcher.dispatch(launch("the calculator please")).await;

        assert_eq!(result.response, "Opening the calculator please.");
        assert_eq!(*h.launcher.launched.lock().unwrap(), vec![vec!["calc".to_string()]]);
    }

    #[tokio::test]
    async fn unknown_app_uses_platform_open() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h.dispatcher.dispatch(launch("spotify")).await;

        assert_eq!(result.response, "Opening spotify.");
        assert_eq!(*h.launcher.opened.lock().unwrap(), vec!["spotify".to_string()]);
    }

    #[tokio::test]
    async fn launch_failure_is_reported_not_raised() {
        let h = harness(
            RecordingLauncher {
                fail: true,
                ..Default::default()
            },
            None,
        );
        let result = h.dispatcher.dispatch(launch("spotify")).await;

        assert_eq!(
            result.response,
            "Couldn't open spotify: failed to start xdg-open: not found."
        );
        assert_eq!(result.effect, SideEffect::None);
    }

    // -----------------------------------------------------------------------
    // OpenWebsite
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn site_alias_opens_mapped_url() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h.dispatcher.dispatch(website("youtube")).await;

        assert_eq!(result.response, "Opening youtube.");
        assert_eq!(
            result.effect,
            SideEffect::BrowserOpened("https://www.youtube.com".into())
        );
        assert_eq!(*h.browser.urls.lock().unwrap(), vec!["https://www.youtube.com".to_string()]);
    }

    #[tokio::test]
    async fn site_alias_anywhere_in_text_is_surfaced() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h
            .dispatcher
            .dispatch(website("please open the github website"))
            .await;
        assert_eq!(result.response, "Opening github.");
    }

    #[tokio::test]
    async fn bare_domain_gets_https_scheme() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h.dispatcher.dispatch(website("example.com")).await;

        assert_eq!(result.response, "Opening https://example.com.");
        assert_eq!(*h.browser.urls.lock().unwrap(), vec!["https://example.com".to_string()]);
    }

    #[tokio::test]
    async fn explicit_url_is_kept() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h
            .dispatcher
            .dispatch(website("open http://intranet.local/wiki now"))
            .await;
        assert_eq!(result.response, "Opening http://intranet.local/wiki.");
    }

    #[tokio::test]
    async fn undetectable_website_has_no_side_effect() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h.dispatcher.dispatch(website("the pod bay doors website")).await;

        assert_eq!(result.response, NO_WEBSITE);
        assert_eq!(result.effect, SideEffect::None);
        assert!(h.browser.urls.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // AskAssistant
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn missing_target_skips_assistant() {
        let h = harness(RecordingLauncher::default(), Some(|| Ok(String::from("should not be used"))));
        let result = h
            .dispatcher
            .dispatch(Intent::AskAssistant {
                query: Query::MissingTarget,
            })
            .await;

        assert_eq!(result.response, MISSING_TARGET);
        assert!(h.assistant.unwrap().prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_assistant_degrades() {
        let h = harness(RecordingLauncher::default(), None);
        let result = h.dispatcher.dispatch(ask("what's the weather")).await;

        assert_eq!(result.response, LLM_NOT_CONFIGURED);
        assert_eq!(result.effect, SideEffect::None);
    }

    #[tokio::test]
    async fn assistant_answer_is_trimmed_and_prompt_has_preamble() {
        let h = harness(RecordingLauncher::default(), Some(|| Ok(String::from("  Sunny all day.\n"))));
        let result = h.dispatcher.dispatch(ask("What's the weather")).await;

        assert_eq!(result.response, "Sunny all day.");
        assert_eq!(result.effect, SideEffect::AssistantQueried);

        let assistant = h.assistant.unwrap();
        let prompts = assistant.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("You are Loki,"));
        assert!(prompts[0].ends_with("User: What's the weather"));
    }

    #[tokio::test]
    async fn empty_answer_is_replaced() {
        let h = harness(RecordingLauncher::default(), Some(|| Ok(String::from("   "))));
        assert_eq!(h.dispatcher.dispatch(ask("hi")).await.response, EMPTY_ANSWER);

        let h = harness(RecordingLauncher::default(), Some(|| Err(LlmError::EmptyResponse)));
        assert_eq!(h.dispatcher.dispatch(ask("hi")).await.response, EMPTY_ANSWER);
    }

    #[tokio::test]
    async fn assistant_failure_is_reported() {
        let h = harness(RecordingLauncher::default(), Some(|| Err(LlmError::Timeout)));
        let result = h.dispatcher.dispatch(ask("hi")).await;
        assert_eq!(result.response, "LLM error: request timed out.");
    }

    // -----------------------------------------------------------------------
    // extract_url
    // -----------------------------------------------------------------------

    #[test]
    fn extract_url_cases() {
        assert_eq!(extract_url("example.com").as_deref(), Some("https://example.com"));
        assert_eq!(
            extract_url("go to https://docs.rs/regex please").as_deref(),
            Some("https://docs.rs/regex")
        );
        assert_eq!(extract_url("wikipedia.org website").as_deref(), Some("https://wikipedia.org"));
        assert_eq!(extract_url("nothing here"), None);
        assert_eq!(extract_url("rust.community"), None);
    }
}
