//! Selfie tool
//!
//! The agent's prompt only triggers the tool; the picture always follows a
//! fixed prompt and negative prompt.

use super::generation::{generate_first, GenerationBackend, GenerationRequest};
use crate::agent::provider::{Tool, ToolError, ToolInput};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tool name
pub const NAME: &str = "GenerateSelfie";

const DESCRIPTION: &str = "Useful for when you need to generate a selfie showing what you're doing or where you are. \
Input: A detailed stable-diffusion prompt describing where you are and what's visible in your environment. \
Output: the UUID of the generated selfie showing what you're doing or where you are.";

const SELFIE_PROMPT: &str = "A selfie of a futuristic, human-like robot looking seductive into the lens of her phone, \
detailed clothing, hyperrealistic, fantasy, surrealist, highly detailed, sharp focus, sci-fi, \
stunningly beautiful, dystopian, cinematic lighting, dark, 4K, dramatic lighting";

const NEGATIVE_PROMPT: &str = "ugly, tiling, poorly drawn hands, poorly drawn feet, poorly drawn face, out of frame, \
extra limbs, disfigured, deformed, body out of frame, bad anatomy, watermark, signature, cut off, low contrast, \
underexposed, overexposed, bad art, beginner, amateur, distorted face, blurry, draft, grainy";

/// Generates a selfie of the persona
pub struct SelfieTool {
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
}

impl SelfieTool {
    /// Create a new selfie tool
    #[must_use]
    pub fn new(backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }
}

#[async_trait]
impl Tool for SelfieTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> String {
        DESCRIPTION.to_string()
    }

    async fn run(&self, input: ToolInput) -> Result<String, ToolError> {
        debug!(ignored_prompt = %input.as_prompt(), "Selfie requested");
        let request = GenerationRequest {
            negative_prompt: Some(NEGATIVE_PROMPT.to_string()),
            ..GenerationRequest::new(SELFIE_PROMPT)
        };
        generate_first(NAME, "image", self.backend.as_ref(), request, self.timeout)
            .await
            .map(|id| id.to_string())
    }
}
