//! All Telegram-specific functionality

pub mod bot;
pub mod client;
pub mod escape;
pub mod updates;

// Re-export main types for convenience
pub use bot::TelegramBot;
pub use client::TelegramClient;
pub use escape::escape_markdown_v2;
