//! Telegram Bot API client module
//!
//! Encapsulates all Bot API calls with retry logic and error handling.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::LazyLock;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

use super::escape::escape_markdown_v2;
use super::updates::{ApiResponse, TelegramMessage, Update, User};
use crate::core::models::ChatId;
use crate::errors::BotError;
use crate::transport::{ChatTransport, MessageHandle, TextFormat};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Maximum attempts for rate-limited calls that carry a `retry_after` hint.
const MAX_RATE_LIMIT_RETRIES: u32 = 5;

static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// Bot API client with retry logic and error handling
pub struct TelegramClient {
    token: String,
    base_url: String,
}

impl TelegramClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token,
            base_url: TELEGRAM_API_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Retry transient failures (network errors, 5xx) with jittered
    /// exponential backoff. API rejections and exhausted rate limits are
    /// returned at once.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, BotError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, BotError>> + Send,
        T: Send,
    {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(4);

        RetryIf::start(strategy, operation, |e: &BotError| {
            matches!(e, BotError::HttpError(_))
        })
        .await
    }

    /// Call a Bot API method, honouring `retry_after` on HTTP 429.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, BotError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut request = HTTP_CLIENT.post(self.method_url(method)).json(payload);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let resp = request
                .send()
                .await
                .map_err(|e| {
                    BotError::HttpError(format!("{method} request failed: {}", e.without_url()))
                })?;
            let status = resp.status();
            let body: ApiResponse<T> = resp.json().await.map_err(|e| {
                BotError::HttpError(format!(
                    "{method} returned HTTP {status} with unreadable body: {}",
                    e.without_url()
                ))
            })?;

            if body.ok {
                return body
                    .result
                    .ok_or_else(|| BotError::ParseError(format!("{method} returned no result")));
            }

            let description = body
                .description
                .unwrap_or_else(|| "unknown error".to_string());

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = body
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map_or(Duration::from_secs(1), Duration::from_secs);
                // Not an HttpError: with_retry must not start another round.
                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    return Err(BotError::ApiError(format!(
                        "{method} rate limited after {MAX_RATE_LIMIT_RETRIES} attempts"
                    )));
                }
                warn!(
                    "Telegram rate limited {} (429), waiting {}s before retry (attempt {}/{})",
                    method,
                    retry_after.as_secs(),
                    attempts,
                    MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(retry_after).await;
                continue;
            }

            if status.is_server_error() {
                return Err(BotError::HttpError(format!(
                    "{method} HTTP {status}: {description}"
                )));
            }

            return Err(BotError::ApiError(format!(
                "{method} failed ({}): {description}",
                body.error_code.map_or_else(|| status.as_u16().to_string(), |c| c.to_string())
            )));
        }
    }

    pub async fn get_me(&self) -> Result<User, BotError> {
        self.with_retry(|| async { self.call("getMe", &json!({}), None).await })
            .await
    }

    /// Long-poll for updates after `offset`. Not retried; the polling loop
    /// owns backoff.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, BotError> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        self.call(
            "getUpdates",
            &payload,
            Some(Duration::from_secs(timeout_secs + 10)),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<TelegramMessage, BotError> {
        let mut payload = json!({
            "chat_id": chat_id.0,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            payload["parse_mode"] = Value::String(mode.to_string());
        }

        self.with_retry(|| async { self.call("sendMessage", &payload, None).await })
            .await
    }

    pub async fn delete_message(&self, chat_id: ChatId, message_id: i64) -> Result<(), BotError> {
        let payload = json!({
            "chat_id": chat_id.0,
            "message_id": message_id,
        });
        let deleted: bool = self
            .with_retry(|| async { self.call("deleteMessage", &payload, None).await })
            .await?;
        debug!(
            "deleteMessage {} in chat {} returned {}",
            message_id, chat_id, deleted
        );
        Ok(())
    }

    /// Publish the command menu shown by Telegram clients.
    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> Result<(), BotError> {
        let commands: Vec<Value> = commands
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();
        let payload = json!({ "commands": commands });

        let _: bool = self
            .with_retry(|| async { self.call("setMyCommands", &payload, None).await })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<MessageHandle, BotError> {
        self.send(chat_id, text, TextFormat::Plain).await
    }

    async fn retract(&self, handle: MessageHandle) -> Result<(), BotError> {
        self.delete_message(handle.chat_id, handle.message_id).await
    }

    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageHandle, BotError> {
        let parse_mode = match format {
            TextFormat::Plain => None,
            TextFormat::MarkdownV2 => Some("MarkdownV2"),
        };
        let sent = self.send_message(chat_id, text, parse_mode).await?;
        Ok(MessageHandle {
            chat_id: ChatId(sent.chat.id),
            message_id: sent.message_id,
        })
    }

    fn escape(&self, text: &str) -> String {
        escape_markdown_v2(text)
    }
}
