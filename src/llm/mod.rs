//! Conversational-model client.
//!
//! This module provides:
//! * [`AssistantClient`]: async trait implemented by all model backends.
//! * [`GeminiClient`]: Gemini `generateContent` REST client.
//! * [`PromptBuilder`]: persona preamble + user query.
//! * [`LlmError`]: error variants for model calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use loki_assistant::config::AppConfig;
//! use loki_assistant::llm::{AssistantClient, GeminiClient, PromptBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     // Fails with LlmError::NotConfigured when GEMINI_API_KEY is unset.
//!     let client = GeminiClient::from_config(&config.llm).unwrap();
//!     let prompt = PromptBuilder::new("Loki").build("What's a good name for a cat?");
//!     println!("{}", client.complete(&prompt).await.unwrap());
//! }
//! ```

pub mod client;
pub mod prompt;

pub use client::{AssistantClient, GeminiClient, LlmError};
pub use prompt::PromptBuilder;
