//! Telegram API calls with automatic retry on transient network failures

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, Message};
use tracing::debug;

/// Sends a plain text message, retrying with exponential backoff.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Shows the "typing…" indicator. Failures are only logged.
pub async fn send_typing(bot: &Bot, chat_id: ChatId) {
    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        debug!(chat_id = chat_id.0, error = %e, "Typing indicator not sent");
    }
}
