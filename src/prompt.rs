use crate::core::models::Message;

/// Minimum number of buffered messages before a summary is attempted.
pub const MIN_MESSAGES_FOR_SUMMARY: usize = 3;

/// Standing instructions for the language model.
pub const SUMMARY_INSTRUCTIONS: &str = "You are a helpful assistant in a Telegram group chat. \
Your task is to provide a concise summary (a TL;DR) of the following conversation. \
The summary should be clear, easy to read, and presented in a few bullet points using markdown dashes (-) or asterisks (*). \
Do not add any extra commentary before or after the summary. Just provide the bullet points.";

/// `author: text` per message, oldest first, newline separated.
#[must_use]
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full prompt handed to the summarizer: instructions followed by the fenced
/// chat history.
#[must_use]
pub fn build_summary_prompt(messages: &[Message]) -> String {
    format!(
        "{SUMMARY_INSTRUCTIONS}\n\nHere is the chat history:\n---\n{}\n---",
        format_transcript(messages)
    )
}

/// Strip control characters other than newlines and tabs from model output
/// before it is escaped for the chat.
#[must_use]
pub fn sanitize_summary(raw: &str) -> String {
    raw.chars()
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
