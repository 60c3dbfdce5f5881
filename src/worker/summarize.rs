//! The summarize workflow for a single chat.
//!
//! `Checking` reads a snapshot and declines below the minimum history,
//! `Summarizing` calls the model with no store lock held, and the buffer is
//! cleared only once the summary has been posted. Every path posts its reply
//! and ends back in idle with a [`SummaryOutcome`]; model and delivery
//! failures never escape this module.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{CANONICAL_FAILURE_MESSAGE, INSUFFICIENT_HISTORY_MESSAGE, processing_message};
use crate::ai::Summarizer;
use crate::core::buffer::BufferStore;
use crate::core::models::ChatId;
use crate::errors::BotError;
use crate::prompt::{MIN_MESSAGES_FOR_SUMMARY, build_summary_prompt, sanitize_summary};
use crate::transport::{ChatTransport, MessageHandle, TextFormat};

/// What a summarize trigger produced, ready to be rendered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Fewer than [`MIN_MESSAGES_FOR_SUMMARY`] messages were buffered.
    InsufficientHistory { available: usize },
    /// `text` was posted to the chat and the buffer has been cleared.
    Summarized { message_count: usize, text: String },
    /// The model call or the summary post failed; the buffer is untouched.
    /// `reason` is for logs, never for users.
    Failed { reason: String },
}

impl SummaryOutcome {
    /// Text posted back to the chat for this outcome.
    #[must_use]
    pub fn reply_text(&self) -> &str {
        match self {
            Self::InsufficientHistory { .. } => INSUFFICIENT_HISTORY_MESSAGE,
            Self::Summarized { text, .. } => text,
            Self::Failed { .. } => CANONICAL_FAILURE_MESSAGE,
        }
    }

    #[must_use]
    pub fn text_format(&self) -> TextFormat {
        match self {
            Self::Summarized { .. } => TextFormat::MarkdownV2,
            _ => TextFormat::Plain,
        }
    }
}

/// Header plus the already-escaped summary body.
#[must_use]
pub fn format_summary_message(message_count: usize, escaped_summary: &str) -> String {
    format!("*📜 TL;DR of the last {message_count} messages:*\n\n{escaped_summary}")
}

/// Status message shown while the model is working. Removed on every exit
/// path: explicitly via [`retract`](Self::retract), or from `Drop` when the
/// workflow is cancelled or unwinds.
struct ProcessingNotice {
    transport: Arc<dyn ChatTransport>,
    handle: Option<MessageHandle>,
}

impl ProcessingNotice {
    async fn post(transport: Arc<dyn ChatTransport>, chat_id: ChatId, text: &str) -> Self {
        let handle = match transport.notify(chat_id, text).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to post processing notice in chat {}: {}", chat_id, e);
                None
            }
        };
        Self { transport, handle }
    }

    async fn retract(mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(e) = self.transport.retract(handle).await
        {
            warn!(
                "Failed to retract processing notice {} in chat {}: {}",
                handle.message_id, handle.chat_id, e
            );
        }
    }
}

impl Drop for ProcessingNotice {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = transport.retract(handle).await {
                        warn!(
                            "Failed to retract processing notice {} in chat {}: {}",
                            handle.message_id, handle.chat_id, e
                        );
                    }
                });
            }
            Err(_) => warn!(
                "No runtime to retract processing notice {} in chat {}",
                handle.message_id, handle.chat_id
            ),
        }
    }
}

pub struct Orchestrator {
    store: Arc<BufferStore>,
    summarizer: Arc<dyn Summarizer>,
    transport: Arc<dyn ChatTransport>,
    timeout: Option<Duration>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<BufferStore>,
        summarizer: Arc<dyn Summarizer>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            store,
            summarizer,
            transport,
            timeout: None,
        }
    }

    /// Give up on the model after `timeout`. `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Summarize the chat's buffered history, post the result and clear the
    /// buffer once the summary is delivered.
    ///
    /// Messages that arrive while the model is running are not part of the
    /// summary and are discarded by the clear that follows it.
    pub async fn summarize(&self, chat_id: ChatId) -> SummaryOutcome {
        let correlation_id = Uuid::new_v4().to_string();

        let snapshot = self.store.snapshot(chat_id).await;
        let message_count = snapshot.len();
        if message_count < MIN_MESSAGES_FOR_SUMMARY {
            info!(
                "Not enough messages to summarize in chat {} ({} buffered, corr_id={})",
                chat_id, message_count, correlation_id
            );
            let outcome = SummaryOutcome::InsufficientHistory {
                available: message_count,
            };
            self.reply(chat_id, &outcome, &correlation_id).await;
            return outcome;
        }

        let prompt = build_summary_prompt(&snapshot);
        drop(snapshot);

        info!(
            "Summarizing {} messages in chat {} (corr_id={})",
            message_count, chat_id, correlation_id
        );

        let notice = ProcessingNotice::post(
            Arc::clone(&self.transport),
            chat_id,
            &processing_message(message_count),
        )
        .await;

        let outcome = match self.call_summarizer(&prompt).await {
            Ok(raw) => self.finish(chat_id, message_count, &raw, &correlation_id).await,
            Err(e) => {
                error!(
                    "Error generating summary for chat {}: {} (corr_id={})",
                    chat_id, e, correlation_id
                );
                SummaryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if matches!(outcome, SummaryOutcome::Failed { .. }) {
            self.reply(chat_id, &outcome, &correlation_id).await;
        }

        notice.retract().await;
        outcome
    }

    /// Post a plain reply for a declined or failed trigger. Nothing is left to
    /// fall back to, so a failed post is only logged.
    async fn reply(&self, chat_id: ChatId, outcome: &SummaryOutcome, correlation_id: &str) {
        if let Err(e) = self
            .transport
            .send(chat_id, outcome.reply_text(), outcome.text_format())
            .await
        {
            error!(
                "Failed to post reply in chat {}: {} (corr_id={})",
                chat_id, e, correlation_id
            );
        }
    }

    async fn finish(
        &self,
        chat_id: ChatId,
        message_count: usize,
        raw_summary: &str,
        correlation_id: &str,
    ) -> SummaryOutcome {
        let summary = sanitize_summary(raw_summary);
        if summary.is_empty() {
            error!(
                "Summarizer returned an empty summary for chat {} (corr_id={})",
                chat_id, correlation_id
            );
            return SummaryOutcome::Failed {
                reason: "empty summary".to_string(),
            };
        }

        let text = format_summary_message(message_count, &self.transport.escape(&summary));

        // History is only dropped once the chat has the summary.
        if let Err(e) = self
            .transport
            .send(chat_id, &text, TextFormat::MarkdownV2)
            .await
        {
            error!(
                "Failed to post summary in chat {}, keeping its buffer: {} (corr_id={})",
                chat_id, e, correlation_id
            );
            return SummaryOutcome::Failed {
                reason: format!("summary delivery failed: {e}"),
            };
        }

        match self.store.clear(chat_id).await {
            Ok(()) => info!(
                "Successfully summarized and cleared buffer for chat {} (corr_id={})",
                chat_id, correlation_id
            ),
            Err(e) => error!(
                "Summarized chat {} but failed to persist the cleared buffer: {} (corr_id={})",
                chat_id, e, correlation_id
            ),
        }

        SummaryOutcome::Summarized {
            message_count,
            text,
        }
    }

    async fn call_summarizer(&self, prompt: &str) -> Result<String, BotError> {
        let attempt = AssertUnwindSafe(self.summarizer.summarize(prompt)).catch_unwind();

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| BotError::Timeout(limit.as_secs()))?,
            None => attempt.await,
        };

        result.unwrap_or_else(|_| Err(BotError::GeneralError("summarizer panicked".to_string())))
    }
}
