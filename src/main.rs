use anyhow::{Context, anyhow};
use std::sync::Arc;
use tldr::core::config::AppConfig;
use tldr::core::{BufferStore, JsonFilePersistence};
use tldr::telegram::{TelegramBot, TelegramClient};
use tldr::worker::{Dispatcher, Orchestrator};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tldr::setup_logging();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Config error: {}", e);
        anyhow!(e)
    })?;

    info!(
        "Using buffer store at {} (max {} messages per chat)",
        config.buffer_store_path.display(),
        config.max_buffer_size
    );
    let persistence = Arc::new(JsonFilePersistence::new(&config.buffer_store_path));
    let store = Arc::new(
        BufferStore::load(persistence, config.max_buffer_size)
            .await
            .context("failed to load message buffers")?,
    );

    let summarizer =
        tldr::ai::summarizer_from_config(&config).context("failed to build summarizer")?;
    let client = Arc::new(TelegramClient::new(config.telegram_token.clone()));

    let orchestrator = Orchestrator::new(Arc::clone(&store), summarizer, client.clone())
        .with_timeout(config.summarizer_timeout);
    let dispatcher = Dispatcher::new(store, Arc::new(orchestrator));

    let mut bot = TelegramBot::new(client, dispatcher, config.poll_timeout_secs);
    bot.initialize()
        .await
        .context("failed to connect to Telegram")?;

    info!("Bot is starting... Press Ctrl-C to stop.");
    bot.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    info!("Bot stopped");
    Ok(())
}
