//! Tools the agent can call, and the toolbox that wires them per chat

pub mod duration;
pub mod generation;
pub mod image;
pub mod reminder;
pub mod search;
pub mod selfie;
pub mod speech;

use super::provider::Tool;
use super::registry::ToolRegistry;
use crate::scheduler::DeferredInvoker;
use generation::GenerationBackend;
use image::{GenerateAlbumArtTool, GenerateImageTool};
use reminder::RemindMeTool;
use search::{SearchBackend, SearchTool};
use selfie::SelfieTool;
use speech::GenerateSpeechTool;
use std::sync::Arc;
use std::time::Duration;

/// Shared backends from which per-chat tool registries are built
#[derive(Clone)]
pub struct Toolbox {
    search: Option<Arc<dyn SearchBackend>>,
    images: Arc<dyn GenerationBackend>,
    speech: Option<Arc<dyn GenerationBackend>>,
    invoker: Arc<dyn DeferredInvoker>,
    timeout: Duration,
}

impl Toolbox {
    /// Create a toolbox. `timeout` bounds every generation call.
    #[must_use]
    pub fn new(
        images: Arc<dyn GenerationBackend>,
        invoker: Arc<dyn DeferredInvoker>,
        timeout: Duration,
    ) -> Self {
        Self {
            search: None,
            images,
            speech: None,
            invoker,
            timeout,
        }
    }

    /// Enables the `Search` tool
    #[must_use]
    pub fn with_search(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(backend);
        self
    }

    /// Enables the `GenerateSpokenAudio` tool and voiced replies
    #[must_use]
    pub fn with_speech(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.speech = Some(backend);
        self
    }

    /// The speech tool, if a voice backend is configured
    #[must_use]
    pub fn speech_tool(&self) -> Option<Arc<dyn Tool>> {
        self.speech
            .as_ref()
            .map(|backend| Arc::new(GenerateSpeechTool::new(Arc::clone(backend), self.timeout)) as Arc<dyn Tool>)
    }

    /// Registry of every available tool, with reminders bound to `chat_id`
    #[must_use]
    pub fn registry_for(&self, chat_id: &str) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        if let Some(search) = &self.search {
            registry.register(Arc::new(SearchTool::new(Arc::clone(search))));
        }
        let image = GenerateImageTool::new(Arc::clone(&self.images), self.timeout);
        registry.register(Arc::new(image.clone()));
        registry.register(Arc::new(GenerateAlbumArtTool::new(image)));
        registry.register(Arc::new(SelfieTool::new(Arc::clone(&self.images), self.timeout)));
        if let Some(speech) = self.speech_tool() {
            registry.register(speech);
        }
        registry.register(Arc::new(RemindMeTool::new(Arc::clone(&self.invoker), chat_id)));
        registry
    }
}
