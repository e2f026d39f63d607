//! Telegram implementation of the chat transport

use super::messaging::{send_long_message, send_media_url};
use super::transport::ChatTransport;
use crate::response::OutboundMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::debug;

/// Sends outbound messages through the Telegram Bot API
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Create a transport for `bot`
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Parses a numeric Telegram chat id
///
/// # Errors
///
/// Returns an error if `chat_id` is not an integer.
pub fn parse_chat_id(chat_id: &str) -> Result<ChatId> {
    chat_id
        .parse::<i64>()
        .map(ChatId)
        .with_context(|| format!("Invalid Telegram chat id: {chat_id}"))
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let chat_id = parse_chat_id(message.chat_id())?;
        match message {
            OutboundMessage::Text { text, .. } => {
                debug!(chat_id = chat_id.0, chars = text.chars().count(), "Sending text");
                send_long_message(&self.bot, chat_id, text).await
            }
            OutboundMessage::Media {
                locator, mime_type, ..
            } => {
                debug!(chat_id = chat_id.0, mime_type = %mime_type, "Sending media");
                send_media_url(&self.bot, chat_id, locator, mime_type).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_id() {
        assert_eq!(parse_chat_id("-100123").ok(), Some(ChatId(-100_123)));
        assert!(parse_chat_id("abc").is_err());
    }
}
