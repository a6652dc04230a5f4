//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]` so a hand-edited file only needs to
//! contain the keys it overrides.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AssistantConfig
// ---------------------------------------------------------------------------

/// Identity of the assistant as shown in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Speaker label used for every assistant message.
    pub name: String,
    /// First message appended to the log at startup.
    pub greeting: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Loki".into(),
            greeting: "Hello! I'm Loki. Click Listen and ask me anything, or tell me to open \
                       apps and websites."
                .into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the conversational-model client.
///
/// The credential is never stored in `settings.toml`; only the name of the
/// environment variable that carries it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Gemini REST API.
    pub base_url: String,
    /// Model identifier (e.g. `"gemini-1.5-flash"`).
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-1.5-flash".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// Read the credential from the environment.
    ///
    /// Returns `None` when the variable is unset or blank, which puts the
    /// assistant into its degraded (no-LLM) mode.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and phrase detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Seconds to wait for speech to start before giving up.
    pub listen_timeout_secs: f32,
    /// Hard upper bound on the length of one phrase.
    pub phrase_time_limit_secs: f32,
    /// Seconds of room noise sampled to set the speech threshold.
    pub ambient_calibration_secs: f32,
    /// Seconds of trailing silence that end a phrase.
    pub silence_hang_secs: f32,
    /// Lowest RMS threshold ever used, even in a perfectly quiet room.
    pub energy_floor: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            listen_timeout_secs: 5.0,
            phrase_time_limit_secs: 12.0,
            ambient_calibration_secs: 0.6,
            silence_hang_secs: 0.8,
            energy_floor: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// GGML model file stem (e.g. `"base.en"` for `ggml-base.en.bin`).
    pub model: String,
    /// ISO-639-1 language code, or `"auto"`.
    pub language: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base.en".into(),
            language: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for spoken output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speech program to run instead of the platform default.  `{text}` in
    /// an argument is replaced by the utterance, otherwise it is appended.
    pub program: Option<Vec<String>>,
    /// Words per minute, passed to programs that accept a rate.
    pub rate_wpm: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: None,
            rate_wpm: 175,
        }
    }
}

// ---------------------------------------------------------------------------
// Alias tables
// ---------------------------------------------------------------------------

/// One entry of the application alias table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppAlias {
    /// Fragment matched (case-insensitively, as a substring) against the
    /// spoken application name.
    pub alias: String,
    /// Program and arguments to spawn.
    pub command: Vec<String>,
}

/// One entry of the website alias table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAlias {
    /// Fragment matched against the utterance.
    pub alias: String,
    /// URL opened when the fragment matches.
    pub url: String,
}

/// Ordered alias tables.  Earlier entries win when several match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    pub apps: Vec<AppAlias>,
    pub sites: Vec<SiteAlias>,
}

fn app(alias: &str, command: &[&str]) -> AppAlias {
    AppAlias {
        alias: alias.into(),
        command: command.iter().map(|s| s.to_string()).collect(),
    }
}

fn site(alias: &str, url: &str) -> SiteAlias {
    SiteAlias {
        alias: alias.into(),
        url: url.into(),
    }
}

impl Default for AliasConfig {
    fn default() -> Self {
        let (terminal, settings): (&[&str], &[&str]) = if cfg!(windows) {
            (&["cmd"], &["start", "ms-settings:"])
        } else if cfg!(target_os = "macos") {
            (&["open", "-a", "Terminal"], &["open", "-a", "System Settings"])
        } else {
            (&["x-terminal-emulator"], &["gnome-control-center"])
        };

        Self {
            apps: vec![
                app("chrome", &["chrome"]),
                app("google chrome", &["chrome"]),
                app("notepad", &["notepad"]),
                app("calculator", &["calc"]),
                app("terminal", terminal),
                app("settings", settings),
            ],
            sites: vec![
                site("youtube", "https://www.youtube.com"),
                site("google", "https://www.google.com"),
                site("gmail", "https://mail.google.com"),
                site("github", "https://github.com"),
                site("stackoverflow", "https://stackoverflow.com"),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window appearance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial inner size of the window in logical pixels.
    pub window_size: (f32, f32),
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (900.0, 600.0),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use loki_assistant::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub assistant: AssistantConfig,
    pub llm: LlmConfig,
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub speech: SpeechConfig,
    pub ui: UiConfig,
    pub aliases: AliasConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
