//! Configuration module for the Loki desktop assistant.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform config directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AliasConfig, AppAlias, AppConfig, AssistantConfig, AudioConfig, LlmConfig, SiteAlias,
    SpeechConfig, SttConfig, UiConfig,
};
