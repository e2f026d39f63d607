//! Telegram delivery of text and media messages

use crate::bot::resilient::send_message_resilient;
use crate::utils;
use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};
use tracing::warn;

/// Maximum message length for Telegram with safety margin (official limit is 4096)
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// How a media URL is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// `send_photo`
    Photo,
    /// `send_audio`
    Audio,
    /// `send_document`
    Document,
}

impl MediaKind {
    /// Picks the delivery method from a MIME type
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type.split('/').next() {
            Some("image") => Self::Photo,
            Some("audio") => Self::Audio,
            _ => Self::Document,
        }
    }
}

/// Sends a text, split into several messages if it exceeds the Telegram limit.
///
/// # Errors
///
/// Returns an error if any part fails to send after retries.
pub async fn send_long_message(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    for part in utils::split_long_message(text, TELEGRAM_MESSAGE_LIMIT) {
        send_message_resilient(bot, chat_id, part).await?;
    }
    Ok(())
}

/// Sends media that Telegram fetches from `url`.
///
/// Photos and audio fall back to a document if native sending fails.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the document fallback fails too.
pub async fn send_media_url(bot: &Bot, chat_id: ChatId, url: &str, mime_type: &str) -> Result<()> {
    let url = reqwest::Url::parse(url).context("Invalid media URL")?;
    let make_file = || InputFile::url(url.clone());

    let native = match MediaKind::from_mime(mime_type) {
        MediaKind::Photo => bot.send_photo(chat_id, make_file()).await.map(|_| ()),
        MediaKind::Audio => bot.send_audio(chat_id, make_file()).await.map(|_| ()),
        MediaKind::Document => {
            bot.send_document(chat_id, make_file()).await?;
            return Ok(());
        }
    };

    if let Err(e) = native {
        warn!(mime_type, error = %e, "Failed to send native media; falling back to document");
        bot.send_document(chat_id, make_file()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Photo);
        assert_eq!(MediaKind::from_mime("audio/mpeg"), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Document);
        assert_eq!(MediaKind::from_mime("application/octet-stream"), MediaKind::Document);
    }
}
