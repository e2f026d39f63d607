//! Spoken audio tool

use super::generation::{generate_first, GenerationBackend, GenerationRequest};
use crate::agent::provider::{Tool, ToolError, ToolInput};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Tool name
pub const NAME: &str = "GenerateSpokenAudio";

const DESCRIPTION: &str = "Used to generate spoken audio from text prompts. Only use if the user has asked \
directly for an audio version of output. When using this tool, the input should be a plain text string \
containing the content to be spoken.";

/// Synthesizes speech for a text
pub struct GenerateSpeechTool {
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
}

impl GenerateSpeechTool {
    /// Create a new speech tool
    #[must_use]
    pub fn new(backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }
}

#[async_trait]
impl Tool for GenerateSpeechTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> String {
        DESCRIPTION.to_string()
    }

    async fn run(&self, input: ToolInput) -> Result<String, ToolError> {
        generate_first(
            NAME,
            "audio",
            self.backend.as_ref(),
            GenerationRequest::new(input.as_prompt()),
            self.timeout,
        )
        .await
        .map(|id| id.to_string())
    }
}
