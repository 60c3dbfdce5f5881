//! Long-polling loop that feeds Telegram updates into the dispatcher.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::client::TelegramClient;
use super::updates::{BotCommand, InboundEvent, Update, classify_update};
use crate::core::buffer::AppendOutcome;
use crate::core::models::ChatId;
use crate::errors::BotError;
use crate::transport::{ChatTransport, TextFormat};
use crate::worker::{Dispatcher, SummaryOutcome};

pub const START_MESSAGE: &str = "👋 Hello! I'm your TLDR Bot.\n\n\
I'll listen to the conversation in this group. \
When you want a summary, just type /tldr.\n\n\
Please make sure I have permission to read messages!";

pub const HELP_MESSAGE: &str = "🤖 How to use me:\n\n\
1. I automatically store messages sent in this group.\n\
2. When you're ready for a summary of the recent conversation, type /tldr.\n\
3. I'll send the conversation to an AI to get a concise summary.\n\
4. After summarizing, I'll clear my memory to start fresh for the next one.";

/// Command menu registered with Telegram on startup.
pub const COMMANDS: &[(&str, &str)] = &[
    ("start", "Start the bot and get a welcome message"),
    ("tldr", "Summarize the recent conversation"),
    ("help", "Show help information"),
];

const MAX_POLL_BACKOFF: Duration = Duration::from_secs(30);

pub struct TelegramBot {
    client: Arc<TelegramClient>,
    dispatcher: Dispatcher,
    poll_timeout_secs: u64,
    bot_username: Option<String>,
}

impl TelegramBot {
    #[must_use]
    pub fn new(client: Arc<TelegramClient>, dispatcher: Dispatcher, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            dispatcher,
            poll_timeout_secs,
            bot_username: None,
        }
    }

    /// Look up the bot's username (for `/cmd@botname` routing) and publish
    /// the command menu.
    ///
    /// # Errors
    ///
    /// Returns an error if `getMe` fails, which usually means a bad token.
    pub async fn initialize(&mut self) -> Result<(), BotError> {
        let me = self.client.get_me().await?;
        info!(
            "Authenticated as @{} (id {})",
            me.username.as_deref().unwrap_or("<no username>"),
            me.id
        );
        self.bot_username = me.username;

        if let Err(e) = self.client.set_my_commands(COMMANDS).await {
            warn!("Failed to register bot commands: {}", e);
        }
        Ok(())
    }

    /// Poll until `shutdown` resolves. Summaries run on their own tasks so a
    /// slow model never holds up message collection.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut offset: i64 = 0;
        let mut backoff = Duration::from_secs(1);

        info!("Bot is polling for updates");
        loop {
            let updates = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping update polling");
                    break;
                }
                result = self.client.get_updates(offset, self.poll_timeout_secs) => result,
            };

            match updates {
                Ok(updates) => {
                    backoff = Duration::from_secs(1);
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(&update).await;
                    }
                }
                Err(e) => {
                    error!("Failed to fetch updates: {}", e);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_POLL_BACKOFF);
                }
            }
        }
    }

    async fn handle_update(&self, update: &Update) {
        match classify_update(update, self.bot_username.as_deref()) {
            InboundEvent::Text {
                chat_id,
                author,
                text,
            } => self.store_message(chat_id, &author, &text).await,
            InboundEvent::Command { chat_id, command } => {
                self.handle_command(chat_id, command).await;
            }
            InboundEvent::Ignored => debug!("Ignoring update {}", update.update_id),
        }
    }

    async fn store_message(&self, chat_id: ChatId, author: &str, text: &str) {
        match self
            .dispatcher
            .on_text(chat_id, author, text, Utc::now())
            .await
        {
            Ok(AppendOutcome::Stored { len, .. }) => {
                info!(
                    "Stored message from {} in chat {} ({} buffered)",
                    author, chat_id, len
                );
            }
            Ok(AppendOutcome::Rejected) => {}
            Err(e) => error!("Failed to store message in chat {}: {}", chat_id, e),
        }
    }

    async fn handle_command(&self, chat_id: ChatId, command: BotCommand) {
        match command {
            BotCommand::Start => {
                if let Err(e) = self.dispatcher.on_startup(chat_id).await {
                    error!("Failed to initialize buffer for chat {}: {}", chat_id, e);
                }
                self.reply(chat_id, START_MESSAGE).await;
            }
            BotCommand::Help => self.reply(chat_id, HELP_MESSAGE).await,
            BotCommand::Tldr => {
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    match dispatcher.on_summarize_command(chat_id).await {
                        SummaryOutcome::Summarized { message_count, .. } => debug!(
                            "Delivered summary of {} messages to chat {}",
                            message_count, chat_id
                        ),
                        SummaryOutcome::InsufficientHistory { available } => debug!(
                            "Declined summary in chat {} ({} buffered)",
                            chat_id, available
                        ),
                        SummaryOutcome::Failed { reason } => {
                            debug!("Summary failed in chat {}: {}", chat_id, reason);
                        }
                    }
                });
            }
            BotCommand::Other(name) => debug!("Ignoring command {} in chat {}", name, chat_id),
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.client.send(chat_id, text, TextFormat::Plain).await {
            error!("Failed to reply in chat {}: {}", chat_id, e);
        }
    }
}
