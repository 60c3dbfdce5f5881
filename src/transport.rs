//! Capabilities the summary workflow needs from the chat platform.

use async_trait::async_trait;

use crate::core::models::ChatId;
use crate::errors::BotError;

/// Reference to a message the bot posted, so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// How the platform should render outgoing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    /// Telegram MarkdownV2; any dynamic text must go through [`ChatTransport::escape`].
    MarkdownV2,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a short-lived status message.
    async fn notify(&self, chat_id: ChatId, text: &str) -> Result<MessageHandle, BotError>;

    /// Remove a message previously returned by [`notify`](Self::notify).
    async fn retract(&self, handle: MessageHandle) -> Result<(), BotError>;

    /// Post a regular reply.
    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageHandle, BotError>;

    /// Make arbitrary text safe to embed in [`TextFormat::MarkdownV2`] output.
    fn escape(&self, text: &str) -> String;
}
