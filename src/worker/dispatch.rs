use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::summarize::{Orchestrator, SummaryOutcome};
use crate::core::buffer::{AppendOutcome, BufferStore};
use crate::core::models::{ChatId, Message};
use crate::errors::BotError;

/// Entry points for inbound chat events. Holds no state of its own.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<BufferStore>,
    orchestrator: Arc<Orchestrator>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(store: Arc<BufferStore>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// A plain text message was posted in `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be persisted.
    pub async fn on_text(
        &self,
        chat_id: ChatId,
        author: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<AppendOutcome, BotError> {
        self.store
            .append(chat_id, Message::new(timestamp, author, text))
            .await
    }

    /// Someone asked for a summary of `chat_id`.
    pub async fn on_summarize_command(&self, chat_id: ChatId) -> SummaryOutcome {
        self.orchestrator.summarize(chat_id).await
    }

    /// The bot was started in `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the new buffer could not be persisted.
    pub async fn on_startup(&self, chat_id: ChatId) -> Result<(), BotError> {
        self.store.ensure_conversation(chat_id).await
    }
}
