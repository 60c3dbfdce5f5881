//! All AI/LLM functionality

pub mod client;
pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::{AppConfig, LlmProvider};
use crate::errors::BotError;

// Re-export main types for convenience
pub use client::{LlmClient, estimate_tokens};
pub use gemini::GeminiClient;

/// A language model that turns a prompt into summary text.
///
/// Implementations make exactly one attempt per call; callers decide what a
/// failure means.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: &str) -> Result<String, BotError>;
}

/// Build the summarizer selected by `LLM_PROVIDER`.
///
/// # Errors
///
/// Returns [`BotError::ConfigError`] if the selected provider has no API key.
pub fn summarizer_from_config(config: &AppConfig) -> Result<Arc<dyn Summarizer>, BotError> {
    match config.llm_provider {
        LlmProvider::OpenAi => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| BotError::ConfigError("OPENAI_API_KEY is not set".to_string()))?;
            Ok(Arc::new(LlmClient::new(
                api_key,
                config.openai_org_id.clone(),
                config.openai_model(),
            )))
        }
        LlmProvider::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| BotError::ConfigError("GEMINI_API_KEY is not set".to_string()))?;
            Ok(Arc::new(GeminiClient::new(api_key, config.gemini_model())))
        }
    }
}
