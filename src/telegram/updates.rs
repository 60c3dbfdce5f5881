//! Telegram Bot API payloads and routing of inbound updates.

use serde::Deserialize;

use crate::core::models::ChatId;

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

impl User {
    /// First name, falling back to the username. Empty when neither is set.
    #[must_use]
    pub fn display_name(&self) -> String {
        if !self.first_name.trim().is_empty() {
            return self.first_name.clone();
        }
        self.username.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Tldr,
    /// A command this bot does not handle, or one addressed to another bot.
    Other(String),
}

/// What the polling loop should do with an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        chat_id: ChatId,
        command: BotCommand,
    },
    Text {
        chat_id: ChatId,
        author: String,
        text: String,
    },
    Ignored,
}

/// Parse a leading `/command` or `/command@botname`.
///
/// Returns `None` when `text` is not a command at all.
#[must_use]
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<BotCommand> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    if name.is_empty() {
        return None;
    }

    let (name, target) = match name.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (name, None),
    };

    if let (Some(target), Some(me)) = (target, bot_username)
        && !target.eq_ignore_ascii_case(me)
    {
        return Some(BotCommand::Other(first.to_string()));
    }

    Some(match name.to_ascii_lowercase().as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "tldr" => BotCommand::Tldr,
        _ => BotCommand::Other(first.to_string()),
    })
}

/// Route an update: commands go to their handlers, other text is buffered,
/// everything else (stickers, joins, edits) is ignored.
#[must_use]
pub fn classify_update(update: &Update, bot_username: Option<&str>) -> InboundEvent {
    let Some(message) = &update.message else {
        return InboundEvent::Ignored;
    };
    let Some(text) = message.text.as_deref() else {
        return InboundEvent::Ignored;
    };
    let chat_id = ChatId(message.chat.id);

    if let Some(command) = parse_command(text, bot_username) {
        return InboundEvent::Command { chat_id, command };
    }
    if text.trim_start().starts_with('/') {
        return InboundEvent::Ignored;
    }

    InboundEvent::Text {
        chat_id,
        author: message
            .from
            .as_ref()
            .map(User::display_name)
            .unwrap_or_default(),
        text: text.to_string(),
    }
}
