use companion_bot::bot::handlers::{handle_text, handle_unsupported};
use companion_bot::bot::{ChatTransport, TelegramTransport};
use companion_bot::config::Settings;
use companion_bot::logging::init_logging;
use companion_bot::pipeline::{build_pipeline, ResponsePipeline};
use companion_bot::scheduler::{dispatch_deferred, TokioScheduler};
use companion_bot::storage::R2Storage;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    init_logging().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?;

    info!("Starting companion bot...");

    let settings = init_settings();
    let storage = init_storage(&settings).await;

    let cancel = CancellationToken::new();
    let (scheduler, due) = TokioScheduler::new(cancel.clone());

    let pipeline = match build_pipeline(&settings, storage, Arc::new(scheduler)) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!("Failed to build response pipeline: {e:#}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(settings.telegram_token.clone());
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot.clone()));

    let reminders = tokio::spawn(dispatch_deferred(due, transport.clone(), cancel.clone()));

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![pipeline, transport])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    cancel.cancel();
    if let Err(e) = reminders.await {
        error!("Reminder dispatcher panicked: {e}");
    }
    info!("Bot stopped.");
    Ok(())
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_storage(settings: &Settings) -> Arc<R2Storage> {
    match R2Storage::new(settings).await {
        Ok(s) => {
            info!("R2 Storage initialized.");
            if let Err(e) = s.check_connection().await {
                error!("R2 Storage connection check returned error: {e}");
            }
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to initialize R2 Storage: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(on_text))
        .branch(dptree::endpoint(handle_unsupported))
}

async fn on_text(
    bot: Bot,
    msg: Message,
    pipeline: Arc<ResponsePipeline>,
    transport: Arc<dyn ChatTransport>,
) -> Result<(), teloxide::RequestError> {
    Box::pin(handle_text(bot, msg, pipeline, transport)).await
}
