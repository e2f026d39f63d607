//! Media generation backends
//!
//! Backends turn a prompt into stored artifacts. Tools call them through
//! [`generate_first`], which bounds the wait and picks the first artifact.

use crate::agent::http::{post_json, send_json_request, HttpError};
use crate::agent::provider::ToolError;
use crate::response::ContentReference;
use crate::storage::{Artifact, ArtifactStore, StorageError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by generation backends
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP call failed
    #[error(transparent)]
    Http(#[from] HttpError),
    /// Returned payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
    /// Storing the result failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Main prompt
    pub prompt: String,
    /// Things the result must avoid
    pub negative_prompt: Option<String>,
    /// Number of results
    pub n: u8,
    /// Output size, e.g. `1024x1024`
    pub size: Option<String>,
}

impl GenerationRequest {
    /// A single-result request for `prompt`
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            n: 1,
            size: None,
        }
    }
}

/// A media generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generates and stores artifacts, returning them in backend order
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<Artifact>, GenerationError>;
}

/// Runs `request` on `backend`, waiting at most `timeout`, and returns the
/// reference of the first artifact.
///
/// # Errors
///
/// `ToolError::Timeout` when the wait expires, `ToolError::Backend` when the
/// backend fails and `ToolError::NoArtifacts` when it returns nothing.
pub async fn generate_first(
    tool: &'static str,
    kind: &'static str,
    backend: &dyn GenerationBackend,
    request: GenerationRequest,
    timeout: Duration,
) -> Result<ContentReference, ToolError> {
    info!(tool, prompt = %request.prompt, "Generating {kind}");

    let artifacts = tokio::time::timeout(timeout, backend.generate(request))
        .await
        .map_err(|_| ToolError::Timeout {
            tool,
            secs: timeout.as_secs(),
        })?
        .map_err(|e| ToolError::Backend {
            tool,
            message: e.to_string(),
        })?;

    info!(tool, count = artifacts.len(), "Got back artifacts");
    let first = artifacts
        .into_iter()
        .next()
        .ok_or(ToolError::NoArtifacts { tool, kind })?;
    debug!(tool, size = first.bytes.len(), id = %first.id, "{kind} size");
    Ok(first.id)
}

#[derive(Deserialize, Debug)]
struct ImageData {
    b64_json: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

/// OpenAI-compatible `/images/generations` backend
pub struct OpenAiImageBackend {
    http: HttpClient,
    api_base: String,
    api_key: String,
    model: String,
    size: String,
    store: Arc<dyn ArtifactStore>,
}

impl OpenAiImageBackend {
    /// Create a new image backend storing results in `store`
    #[must_use]
    pub fn new(
        http: HttpClient,
        api_base: &str,
        api_key: String,
        model: String,
        size: String,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            size,
            store,
        }
    }
}

/// Folds the negative prompt into the prompt, the images API has no separate field
fn image_prompt(request: &GenerationRequest) -> String {
    match &request.negative_prompt {
        Some(negative) => format!("{}\n\nAvoid: {negative}", request.prompt),
        None => request.prompt.clone(),
    }
}

#[async_trait]
impl GenerationBackend for OpenAiImageBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<Artifact>, GenerationError> {
        let body = json!({
            "model": self.model,
            "prompt": image_prompt(&request),
            "n": request.n,
            "size": request.size.as_deref().unwrap_or(&self.size),
            "response_format": "b64_json",
        });
        let auth = format!("Bearer {}", self.api_key);
        let response: ImageResponse = send_json_request(
            &self.http,
            &format!("{}/images/generations", self.api_base),
            &body,
            &[("Authorization", auth.as_str())],
        )
        .await?;

        let mut artifacts = Vec::with_capacity(response.data.len());
        for encoded in response.data.into_iter().filter_map(|d| d.b64_json) {
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| GenerationError::Decode(e.to_string()))?;
            let artifact = Artifact::new("image/png", bytes);
            self.store.put(&artifact).await?;
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }
}

/// ElevenLabs text-to-speech backend
pub struct ElevenLabsBackend {
    http: HttpClient,
    api_key: String,
    voice_id: String,
    store: Arc<dyn ArtifactStore>,
}

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";
const ELEVENLABS_MODEL: &str = "eleven_monolingual_v1";

impl ElevenLabsBackend {
    /// Create a new speech backend storing results in `store`
    #[must_use]
    pub fn new(
        http: HttpClient,
        api_key: String,
        voice_id: String,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            http,
            api_key,
            voice_id,
            store,
        }
    }
}

#[async_trait]
impl GenerationBackend for ElevenLabsBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<Artifact>, GenerationError> {
        let body = json!({
            "text": request.prompt,
            "model_id": ELEVENLABS_MODEL,
        });
        let response = post_json(
            &self.http,
            &format!("{ELEVENLABS_API_BASE}/text-to-speech/{}", self.voice_id),
            &body,
            &[("xi-api-key", self.api_key.as_str()), ("Accept", "audio/mpeg")],
        )
        .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        let artifact = Artifact::new("audio/mpeg", bytes);
        self.store.put(&artifact).await?;
        Ok(vec![artifact])
    }
}
