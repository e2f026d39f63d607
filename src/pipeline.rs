//! Turn pipeline
//!
//! Inbound text goes through the agent, the segmenter, the optional voice
//! augmenter and the assembler. `/start` short-circuits with a greeting.

use crate::agent::http::create_http_client;
use crate::agent::tools::generation::{ElevenLabsBackend, OpenAiImageBackend};
use crate::agent::{AgentError, ConversationAgent, OpenAiAgent, ToolError, Toolbox};
use crate::config::{Settings, GENERATION_TIMEOUT_SECS, LLM_REQUEST_TIMEOUT_SECS, START_GREETING};
use crate::response::{
    segment, ContentMaterializer, MaterializeError, MessageAssembler, OutboundMessage,
    VoiceAugmenter,
};
use crate::scheduler::DeferredInvoker;
use crate::storage::R2Storage;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Command that resets the conversation
pub const START_COMMAND: &str = "/start";

/// Errors that abort a turn; nothing is sent when they occur
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The agent failed (LLM, tool or history error)
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// Speech synthesis failed
    #[error("voice augmentation failed: {0}")]
    Voice(#[source] ToolError),
    /// A media segment could not be published
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// A chat message received from a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Chat the message came from
    pub chat_id: String,
    /// Message text
    pub text: String,
}

impl IncomingMessage {
    /// Create an incoming message
    #[must_use]
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }
}

/// Builds the outbound messages of one turn
#[derive(Clone)]
pub struct ResponsePipeline {
    agent: Arc<dyn ConversationAgent>,
    voice: Option<VoiceAugmenter>,
    assembler: MessageAssembler,
}

impl ResponsePipeline {
    /// Create a pipeline. `voice` is set only when a speech backend exists.
    #[must_use]
    pub fn new(
        agent: Arc<dyn ConversationAgent>,
        voice: Option<VoiceAugmenter>,
        assembler: MessageAssembler,
    ) -> Self {
        Self {
            agent,
            voice,
            assembler,
        }
    }

    /// Produces the ordered messages answering `incoming`.
    ///
    /// # Errors
    ///
    /// Returns the first agent, voice or materialization error; no partial
    /// output is produced.
    pub async fn create_response(
        &self,
        incoming: &IncomingMessage,
    ) -> Result<Vec<OutboundMessage>, ResponseError> {
        let chat_id = incoming.chat_id.as_str();

        if is_start_command(&incoming.text) {
            info!(chat_id, "Starting new conversation");
            self.agent.reset(chat_id).await?;
            return Ok(vec![OutboundMessage::text(chat_id, START_GREETING)]);
        }

        let raw = self.agent.run(chat_id, &incoming.text).await?;
        let mut segments = segment(&raw);
        debug!(
            chat_id,
            segments = segments.len(),
            media = segments.iter().filter(|s| s.is_media()).count(),
            "Segmented agent output"
        );

        if let Some(voice) = &self.voice {
            segments = voice.augment(segments).await.map_err(ResponseError::Voice)?;
        }

        Ok(self.assembler.assemble(chat_id, segments).await?)
    }
}

/// Wires the production pipeline: OpenAI agent and images, optional Tavily
/// search, optional ElevenLabs voice, R2 storage.
///
/// # Errors
///
/// Returns an error if the personality is unknown or the OpenAI key is missing.
pub fn build_pipeline(
    settings: &Settings,
    storage: Arc<R2Storage>,
    invoker: Arc<dyn DeferredInvoker>,
) -> anyhow::Result<ResponsePipeline> {
    let personality = settings.personality()?;
    let api_key = settings
        .openai_api_key
        .clone()
        .context("Missing OPENAI_API_KEY")?;
    let http = create_http_client(LLM_REQUEST_TIMEOUT_SECS);

    let images = Arc::new(OpenAiImageBackend::new(
        http.clone(),
        &settings.openai_api_base,
        api_key.clone(),
        settings.image_model.clone(),
        settings.image_size.clone(),
        storage.clone(),
    ));
    let mut toolbox = Toolbox::new(images, invoker, Duration::from_secs(GENERATION_TIMEOUT_SECS));

    match settings.tavily_api_key.as_deref() {
        #[cfg(feature = "tavily")]
        Some(key) => {
            let search = crate::agent::tools::search::TavilySearch::new(key)?;
            toolbox = toolbox.with_search(Arc::new(search));
        }
        #[cfg(not(feature = "tavily"))]
        Some(_) => warn!("TAVILY_API_KEY is set but the tavily feature is disabled"),
        None => warn!("TAVILY_API_KEY not set, Search tool disabled"),
    }

    if let Some(key) = settings.elevenlabs_api_key.clone() {
        info!(voice_id = settings.voice_id(), "Voice replies enabled");
        toolbox = toolbox.with_speech(Arc::new(ElevenLabsBackend::new(
            http.clone(),
            key,
            settings.voice_id().to_string(),
            storage.clone(),
        )));
    }

    let voice = toolbox.speech_tool().map(VoiceAugmenter::new);
    let agent = Arc::new(OpenAiAgent::new(
        http,
        &settings.openai_api_base,
        api_key,
        settings.chat_model.clone(),
        personality,
        toolbox,
        storage.clone(),
    ));
    let assembler = MessageAssembler::new(ContentMaterializer::new(storage));

    info!(personality = %personality, model = %settings.chat_model, "Pipeline ready");
    Ok(ResponsePipeline::new(agent, voice, assembler))
}

/// `/start`, optionally addressed to a bot as in group chats (`/start@SomeBot`)
fn is_start_command(text: &str) -> bool {
    let trimmed = text.trim();
    match trimmed.split_once('@') {
        Some((command, bot)) => command == START_COMMAND && !bot.contains(char::is_whitespace),
        None => trimmed == START_COMMAND,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::MockConversationAgent;
    use crate::response::ContentMaterializer;
    use crate::storage::MockArtifactStore;

    fn assembler_without_media() -> MessageAssembler {
        let mut store = MockArtifactStore::new();
        store.expect_get().never();
        MessageAssembler::new(ContentMaterializer::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_start_resets_and_greets() {
        let mut agent = MockConversationAgent::new();
        agent
            .expect_reset()
            .withf(|chat_id| chat_id == "42")
            .times(1)
            .returning(|_| Ok(()));
        agent.expect_run().never();

        let pipeline = ResponsePipeline::new(Arc::new(agent), None, assembler_without_media());
        let out = pipeline
            .create_response(&IncomingMessage::new("42", "/start"))
            .await
            .expect("greeting");
        assert_eq!(out, vec![OutboundMessage::text("42", START_GREETING)]);
    }

    #[tokio::test]
    async fn test_start_addressed_to_bot_resets_and_greets() {
        let mut agent = MockConversationAgent::new();
        agent.expect_reset().times(1).returning(|_| Ok(()));
        agent.expect_run().never();

        let pipeline = ResponsePipeline::new(Arc::new(agent), None, assembler_without_media());
        let out = pipeline
            .create_response(&IncomingMessage::new("42", " /start@CompanionBot\n"))
            .await
            .expect("greeting");
        assert_eq!(out, vec![OutboundMessage::text("42", START_GREETING)]);
    }

    #[test]
    fn test_start_command_forms() {
        assert!(is_start_command("/start"));
        assert!(is_start_command("/start@CompanionBot"));
        assert!(!is_start_command("/starts"));
        assert!(!is_start_command("/stop@CompanionBot"));
        assert!(!is_start_command("/start@CompanionBot please"));
        assert!(!is_start_command("email me at /start@home later"));
    }

    #[tokio::test]
    async fn test_text_only_answer() {
        let mut agent = MockConversationAgent::new();
        agent
            .expect_run()
            .withf(|chat_id, input| chat_id == "42" && input == "hi")
            .returning(|_, _| Ok("Hello! How are you?".to_string()));

        let pipeline = ResponsePipeline::new(Arc::new(agent), None, assembler_without_media());
        let out = pipeline
            .create_response(&IncomingMessage::new("42", "hi"))
            .await
            .expect("reply");
        assert_eq!(out, vec![OutboundMessage::text("42", "Hello! How are you?")]);
    }

    #[tokio::test]
    async fn test_agent_error_aborts_turn() {
        let mut agent = MockConversationAgent::new();
        agent.expect_run().returning(|_, _| {
            Err(AgentError::Tool(ToolError::NoArtifacts {
                tool: "GenerateImage",
                kind: "image",
            }))
        });

        let pipeline = ResponsePipeline::new(Arc::new(agent), None, assembler_without_media());
        let err = pipeline
            .create_response(&IncomingMessage::new("42", "draw"))
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("Tool unable to generate image!"));
    }
}
