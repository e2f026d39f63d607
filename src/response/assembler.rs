//! Message assembly
//!
//! Maps segments one-to-one onto outbound chat messages, publishing media
//! through the materializer.

use super::materializer::{ContentMaterializer, MaterializeError};
use super::segment::Segment;

/// A message ready for the chat transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Plain text message
    Text {
        /// Destination chat
        chat_id: String,
        /// Message body
        text: String,
    },
    /// Media message fetched by URL
    Media {
        /// Destination chat
        chat_id: String,
        /// Signed read URL
        locator: String,
        /// MIME type of the media
        mime_type: String,
    },
}

impl OutboundMessage {
    /// Plain text message to `chat_id`
    #[must_use]
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }

    /// Destination chat
    #[must_use]
    pub fn chat_id(&self) -> &str {
        match self {
            Self::Text { chat_id, .. } | Self::Media { chat_id, .. } => chat_id,
        }
    }
}

/// Builds outbound messages from segments
#[derive(Clone)]
pub struct MessageAssembler {
    materializer: ContentMaterializer,
}

impl MessageAssembler {
    /// Create an assembler publishing media through `materializer`
    #[must_use]
    pub const fn new(materializer: ContentMaterializer) -> Self {
        Self { materializer }
    }

    /// Converts `segments` into messages for `chat_id`, preserving order.
    ///
    /// # Errors
    ///
    /// Fails on the first media segment that cannot be materialized; no
    /// partial output is returned.
    pub async fn assemble(
        &self,
        chat_id: &str,
        segments: Vec<Segment>,
    ) -> Result<Vec<OutboundMessage>, MaterializeError> {
        let mut messages = Vec::with_capacity(segments.len());
        for segment in segments {
            let message = match segment {
                Segment::Text(text) => OutboundMessage::text(chat_id, text),
                Segment::MediaRef(reference) => {
                    let locator = self.materializer.materialize(&reference).await?;
                    OutboundMessage::Media {
                        chat_id: chat_id.to_string(),
                        locator: locator.url,
                        mime_type: locator.mime_type,
                    }
                }
            };
            messages.push(message);
        }
        Ok(messages)
    }
}
