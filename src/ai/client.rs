//! LLM (`OpenAI`) API client module
//!
//! Sends the summary prompt to the Responses API and extracts the text output.

use async_trait::async_trait;
use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;

use super::Summarizer;
use crate::errors::BotError;

const MAX_CONTEXT_TOKENS: usize = 400_000;
const MAX_OUTPUT_TOKENS: usize = 4_000;
const TOKEN_BUFFER: usize = 250;

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(810))
        .build()
        .unwrap_or_else(|_| Client::new())
});

#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4 + 1
}

/// LLM API client for generating summaries
pub struct LlmClient {
    api_key: String,
    org_id: Option<String>,
    model_name: String,
    endpoint: String,
}

impl LlmClient {
    #[must_use]
    pub fn new(api_key: String, org_id: Option<String>, model_name: String) -> Self {
        Self {
            api_key,
            org_id,
            model_name,
            endpoint: OPENAI_RESPONSES_URL.to_string(),
        }
    }

    /// Point the client at a compatible endpoint instead of api.openai.com.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn build_prompt(&self, prompt: &str) -> Vec<ChatCompletionMessage> {
        vec![
            ChatCompletionMessage {
                role: MessageRole::system,
                content: Content::Text(
                    "You are TLDR-bot, an assistant that summarises group chat conversations. \
                    Provide only the summary, no hidden thoughts or analysis."
                        .to_string(),
                ),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            },
            ChatCompletionMessage {
                role: MessageRole::user,
                content: Content::Text(prompt.to_string()),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            },
        ]
    }

    fn headers(&self) -> Result<HeaderMap, BotError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| BotError::ConfigError(format!("invalid OPENAI_API_KEY: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(org) = &self.org_id {
            let org = HeaderValue::from_str(org)
                .map_err(|e| BotError::ConfigError(format!("invalid OPENAI_ORG_ID: {}", e)))?;
            headers.insert("OpenAI-Organization", org);
        }
        Ok(headers)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP request to `OpenAI` fails or the response
    /// carries no output text.
    pub async fn generate_summary(
        &self,
        prompt: Vec<ChatCompletionMessage>,
    ) -> Result<String, BotError> {
        #[cfg(feature = "debug-logs")]
        info!("Using ChatGPT prompt:\n{:?}", prompt);

        let input_messages = build_responses_input_from_prompt(&prompt);
        let estimated_input_tokens = prompt
            .iter()
            .map(|msg| match &msg.content {
                Content::Text(text) => estimate_tokens(text),
                Content::ImageUrl(_) => 0,
            })
            .sum::<usize>();

        let max_output_tokens = MAX_CONTEXT_TOKENS
            .saturating_sub(estimated_input_tokens)
            .saturating_sub(TOKEN_BUFFER)
            .min(MAX_OUTPUT_TOKENS);

        info!(
            "Requesting summary from {} (estimated input tokens: {}, max output tokens: {})",
            self.model_name, estimated_input_tokens, max_output_tokens
        );

        let request_body = json!({
            "model": self.model_name,
            "input": input_messages,
            "max_output_tokens": max_output_tokens
        });

        let response = HTTP_CLIENT
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                BotError::HttpError(format!("OpenAI API request failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BotError::OpenAIError(format!(
                "OpenAI API error (HTTP {}): {}",
                status, error_text
            )));
        }

        let response_json: Value = response.json().await.map_err(|e| {
            BotError::OpenAIError(format!("Failed to parse OpenAI response: {}", e.without_url()))
        })?;

        extract_output_text(&response_json)
            .ok_or_else(|| BotError::OpenAIError("No text in response".to_string()))
    }
}

#[async_trait]
impl Summarizer for LlmClient {
    async fn summarize(&self, prompt: &str) -> Result<String, BotError> {
        self.generate_summary(self.build_prompt(prompt)).await
    }
}

/// Convert chat messages into the Responses API `input` array.
pub(crate) fn build_responses_input_from_prompt(prompt: &[ChatCompletionMessage]) -> Vec<Value> {
    prompt
        .iter()
        .filter_map(|msg| {
            let role = match msg.role {
                MessageRole::system => "system",
                MessageRole::user => "user",
                MessageRole::assistant => "assistant",
                MessageRole::function | MessageRole::tool => return None,
            };
            let Content::Text(text) = &msg.content else {
                return None;
            };
            Some(json!({
                "role": role,
                "content": [{ "type": "input_text", "text": text }]
            }))
        })
        .collect()
}

/// Pull the generated text out of a Responses API body: the `output_text`
/// convenience field when present, otherwise every `output_text` part of the
/// `output` items joined by newlines. Blank text counts as no text.
#[must_use]
pub fn extract_output_text(response_json: &Value) -> Option<String> {
    let direct = response_json
        .get("output_text")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string);
    if direct.is_some() {
        return direct;
    }

    let mut collected: Vec<String> = Vec::new();
    if let Some(items) = response_json.get("output").and_then(|o| o.as_array()) {
        for item in items {
            let Some(parts) = item.get("content").and_then(|c| c.as_array()) else {
                continue;
            };
            for part in parts {
                let is_output_text = part
                    .get("type")
                    .and_then(|t| t.as_str())
                    .is_some_and(|t| t == "output_text");
                if !is_output_text {
                    continue;
                }
                if let Some(s) = part.get("text").and_then(|t| t.as_str()) {
                    collected.push(s.to_string());
                } else if let Some(s) = part
                    .get("text")
                    .and_then(|t| t.get("value"))
                    .and_then(|v| v.as_str())
                {
                    collected.push(s.to_string());
                }
            }
        }
    }

    let joined = collected.join("\n");
    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}
