use openai_api_rs::v1::error::APIError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Failed to parse Telegram update: {0}")]
    ParseError(String),

    #[error("Failed to access Telegram API: {0}")]
    ApiError(String),

    #[error("Failed to access OpenAI API: {0}")]
    OpenAIError(String),

    #[error("Failed to access Gemini API: {0}")]
    GeminiError(String),

    #[error("Failed to send HTTP request: {0}")]
    HttpError(String),

    #[error("Failed to persist message buffers: {0}")]
    StorageError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Timed out after {0}s waiting for the summarizer")]
    Timeout(u64),

    #[error("{0}")]
    GeneralError(String),
}

// Request URLs carry credentials (bot token in the path, API keys in queries),
// so they never make it into the message.
impl From<reqwest::Error> for BotError {
    fn from(error: reqwest::Error) -> Self {
        BotError::HttpError(error.without_url().to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(error: serde_json::Error) -> Self {
        BotError::ParseError(error.to_string())
    }
}

impl From<std::io::Error> for BotError {
    fn from(error: std::io::Error) -> Self {
        BotError::StorageError(error.to_string())
    }
}

impl From<anyhow::Error> for BotError {
    fn from(error: anyhow::Error) -> Self {
        BotError::GeneralError(error.to_string())
    }
}

impl From<APIError> for BotError {
    fn from(error: APIError) -> Self {
        BotError::OpenAIError(format!("OpenAI API error: {}", error))
    }
}
