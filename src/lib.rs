/// TLDR - A Telegram group-chat bot that summarizes recent conversation on request.
///
/// The bot keeps a bounded, persisted buffer of recent messages for every chat
/// it is in. When someone sends `/tldr`, the buffered history is sent to a
/// language model and the resulting summary is posted back; the buffer is then
/// cleared so the next summary starts fresh.
///
/// # Architecture
///
/// - [`core::BufferStore`]: per-chat bounded FIFO buffers with per-chat locks,
///   persisted to a JSON document after every mutation
/// - [`worker::Orchestrator`]: the summarize workflow (threshold check, model
///   call, clear on success)
/// - [`worker::Dispatcher`]: the entry points inbound chat events call
/// - [`ai`]: `OpenAI` and Gemini summarizer backends
/// - [`telegram`]: the Bot API client and long-polling loop
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tldr::core::{BufferStore, JsonFilePersistence};
/// use tldr::core::config::AppConfig;
/// use tldr::telegram::{TelegramBot, TelegramClient};
/// use tldr::worker::{Dispatcher, Orchestrator};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     tldr::setup_logging();
///     let config = AppConfig::from_env()?;
///
///     let persistence = Arc::new(JsonFilePersistence::new(&config.buffer_store_path));
///     let store = Arc::new(BufferStore::load(persistence, config.max_buffer_size).await?);
///     let client = Arc::new(TelegramClient::new(config.telegram_token.clone()));
///     let summarizer = tldr::ai::summarizer_from_config(&config)?;
///
///     let orchestrator = Orchestrator::new(store.clone(), summarizer, client.clone())
///         .with_timeout(config.summarizer_timeout);
///     let dispatcher = Dispatcher::new(store, Arc::new(orchestrator));
///
///     let mut bot = TelegramBot::new(client, dispatcher, config.poll_timeout_secs);
///     bot.initialize().await?;
///     bot.run(async {
///         let _ = tokio::signal::ctrl_c().await;
///     })
///     .await;
///     Ok(())
/// }
/// ```
// Module declarations
pub mod ai;
pub mod core;
pub mod errors;
pub mod prompt;
pub mod telegram;
pub mod transport;
pub mod worker;

pub use ai::estimate_tokens;
pub use errors::BotError;

/// Configure structured logging with JSON output.
///
/// Log level defaults to `info` and can be overridden with `RUST_LOG`.
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
///
/// # Example
///
/// ```
/// tldr::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
