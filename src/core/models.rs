use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a chat (Telegram `chat.id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A chat message captured for a later summary. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub text: String,
}

impl Message {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            author: author.into(),
            text: text.into(),
        }
    }

    /// Messages with a blank author or blank text are never buffered.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.author.trim().is_empty() && !self.text.trim().is_empty()
    }

    /// Transcript line used in the summary prompt.
    #[must_use]
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.author, self.text)
    }
}
