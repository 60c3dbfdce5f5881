//! Google Gemini API client
//!
//! Calls the `generateContent` endpoint with the summary prompt as a single
//! user turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;

use super::Summarizer;
use crate::errors::BotError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(810))
        .build()
        .unwrap_or_else(|_| Client::new())
});

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_for(prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.4,
                max_output_tokens: 2048,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetails {
    code: u16,
    message: String,
}

/// Text of the first candidate, parts joined in order. `None` when the model
/// returned no usable text (blocked, empty, or missing candidates).
fn candidate_text(response: GeminiResponse) -> Option<String> {
    let candidate = response.candidates.into_iter().next()?;
    let text = candidate
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Parse a `generateContent` response body into the summary text.
pub fn parse_generate_content(body: &str) -> Result<String, BotError> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| BotError::GeminiError(format!("Failed to parse response: {}", e)))?;

    let finish_reason = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.clone());

    candidate_text(response).ok_or_else(|| {
        BotError::GeminiError(format!(
            "No text in response (finish reason: {})",
            finish_reason.as_deref().unwrap_or("unknown")
        ))
    })
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize(&self, prompt: &str) -> Result<String, BotError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        info!("Requesting summary from Gemini model {}", self.model);

        let response = HTTP_CLIENT
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_for(prompt))
            .send()
            .await
            .map_err(|e| {
                BotError::HttpError(format!("Gemini API request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorBody>(&body)
                .map(|e| format!("{} (code {})", e.error.message, e.error.code))
                .unwrap_or(body);
            return Err(BotError::GeminiError(format!(
                "HTTP {}: {}",
                status, message
            )));
        }

        parse_generate_content(&body)
    }
}
