//! Update handlers

use super::resilient::{send_message_resilient, send_typing};
use super::transport::{send_all, ChatTransport};
use crate::pipeline::{IncomingMessage, ResponsePipeline};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info};

/// Shown when a turn fails
pub const FAILURE_NOTICE: &str = "Sorry, something went wrong while preparing my answer. Please try again.";

/// Shown for updates the bot cannot read
pub const TEXT_ONLY_NOTICE: &str = "I can only read text messages for now.";

/// Runs one turn for a text message and delivers the reply.
///
/// A failed turn sends nothing but the failure notice.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    pipeline: Arc<ResponsePipeline>,
    transport: Arc<dyn ChatTransport>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let incoming = IncomingMessage::new(msg.chat.id.0.to_string(), text);
    info!(chat_id = %incoming.chat_id, chars = text.chars().count(), "Incoming message");

    send_typing(&bot, msg.chat.id).await;

    let delivered = match pipeline.create_response(&incoming).await {
        Ok(messages) => send_all(transport.as_ref(), &messages).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = delivered {
        error!(chat_id = %incoming.chat_id, error = %e, "Turn failed");
        if let Err(e) = send_message_resilient(&bot, msg.chat.id, FAILURE_NOTICE).await {
            error!(chat_id = %incoming.chat_id, error = %e, "Failed to send failure notice");
        }
    }
    respond(())
}

/// Replies to non-text messages
pub async fn handle_unsupported(bot: Bot, msg: Message) -> ResponseResult<()> {
    if let Err(e) = send_message_resilient(&bot, msg.chat.id, TEXT_ONLY_NOTICE).await {
        error!(chat_id = msg.chat.id.0, error = %e, "Failed to send notice");
    }
    respond(())
}
