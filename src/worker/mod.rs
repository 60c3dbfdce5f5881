//! Summarize workflow and the dispatch entry points the transport calls

pub mod dispatch;
pub mod summarize;

pub use dispatch::Dispatcher;
pub use summarize::{Orchestrator, SummaryOutcome};

/// Canonical failure message shown to users when summarization fails.
pub const CANONICAL_FAILURE_MESSAGE: &str =
    "😥 Sorry, I ran into an error while trying to create the summary. Please try again later.";

/// Reply when a chat has too little history to summarize.
pub const INSUFFICIENT_HISTORY_MESSAGE: &str =
    "There aren't enough messages to summarize yet. Keep chatting!";

/// Transient notice posted while the model is working.
#[must_use]
pub fn processing_message(message_count: usize) -> String {
    format!("🧠 Got it. Summarizing the last {message_count} messages...")
}
