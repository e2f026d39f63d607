//! Outbound delivery seam shared by the Telegram bot, the console and the scheduler

use crate::response::OutboundMessage;
use async_trait::async_trait;

/// Delivers assembled messages to a chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends one message
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()>;
}

/// Sends messages in order, stopping at the first failure
///
/// # Errors
///
/// Returns the first transport error.
pub async fn send_all(
    transport: &dyn ChatTransport,
    messages: &[OutboundMessage],
) -> anyhow::Result<()> {
    for message in messages {
        transport.send(message).await?;
    }
    Ok(())
}
