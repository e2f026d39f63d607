//! Image generation tools

use super::generation::{generate_first, GenerationBackend, GenerationRequest};
use crate::agent::provider::{Tool, ToolError, ToolInput};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Image tool name
pub const NAME: &str = "GenerateImage";
/// Album art tool name
pub const ALBUM_ART_NAME: &str = "GenerateAlbumArt";

const DESCRIPTION: &str = "Useful for when you need to generate an image. \
Input: A detailed dall-e prompt describing an image \
Output: the UUID of a generated image";

const ALBUM_ART_DESCRIPTION: &str = "Useful for when you need to generate album art. \
Input: A description of the album that needs art \
Output: the UUID of a generated image";

const ALBUM_ART_STYLE: &str =
    "album art, 4k, high def, pop art, professional, high quality, award winning, grammy, platinum";

/// Generates an image from the agent's prompt
#[derive(Clone)]
pub struct GenerateImageTool {
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
}

impl GenerateImageTool {
    /// Create a new image tool
    #[must_use]
    pub fn new(backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    async fn generate(&self, tool: &'static str, prompt: String) -> Result<String, ToolError> {
        generate_first(
            tool,
            "image",
            self.backend.as_ref(),
            GenerationRequest::new(prompt),
            self.timeout,
        )
        .await
        .map(|id| id.to_string())
    }
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> String {
        DESCRIPTION.to_string()
    }

    async fn run(&self, input: ToolInput) -> Result<String, ToolError> {
        self.generate(NAME, input.as_prompt()).await
    }
}

/// Generates album art: the image tool with a fixed style prefix
pub struct GenerateAlbumArtTool {
    image: GenerateImageTool,
}

impl GenerateAlbumArtTool {
    /// Wraps an image tool
    #[must_use]
    pub const fn new(image: GenerateImageTool) -> Self {
        Self { image }
    }
}

#[async_trait]
impl Tool for GenerateAlbumArtTool {
    fn name(&self) -> &'static str {
        ALBUM_ART_NAME
    }

    fn description(&self) -> String {
        ALBUM_ART_DESCRIPTION.to_string()
    }

    async fn run(&self, input: ToolInput) -> Result<String, ToolError> {
        let prompt = format!("{ALBUM_ART_STYLE}, {}", input.as_prompt());
        self.image.generate(ALBUM_ART_NAME, prompt).await
    }
}
