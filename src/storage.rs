//! Storage layer for generated artifacts and chat history
//!
//! Provides a persistent storage implementation using Cloudflare R2 / AWS S3.
//! Artifacts (images, audio) live under `blocks/`, publicly shared copies
//! under `plugin-data/`, conversation history under `history/`.

use crate::config::{Settings, SIGNED_URL_TTL_SECS};
use crate::response::ContentReference;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use bytes::Bytes;
use futures_util::FutureExt;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error retrieving object from S3
    #[error("S3 Get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// Error writing, listing or deleting objects in S3
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// No artifact is stored under the reference
    #[error("Artifact not found: {0}")]
    NotFound(ContentReference),
    /// Presigned URL could not be issued
    #[error("Signed URL error: {0}")]
    SignedUrl(String),
    /// Upload through a signed URL failed
    #[error("Upload error: {0}")]
    Upload(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration error (missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A stored binary artifact produced by a generation backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Reference the artifact is stored under
    pub id: ContentReference,
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Raw content
    pub bytes: Bytes,
}

impl Artifact {
    /// Creates an artifact with a fresh random reference
    #[must_use]
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            id: ContentReference::new_random(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Logical bucket a signed URL points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Canonical artifact blobs
    Blocks,
    /// Files shared through signed URLs
    PluginData,
}

impl Bucket {
    /// Key prefix of the bucket
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::PluginData => "plugin-data",
        }
    }
}

/// Access granted by a signed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedUrlOperation {
    /// GET access
    Read,
    /// PUT access
    Write,
}

/// Request for a time-limited URL bound to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlRequest {
    /// Target bucket
    pub bucket: Bucket,
    /// Path inside the bucket
    pub path: String,
    /// Granted operation
    pub operation: SignedUrlOperation,
}

/// A message in the conversation history
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// Role of the message sender (user or assistant)
    pub role: String,
    /// Text content of the message
    pub content: String,
}

impl ChatTurn {
    /// A user turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// An assistant turn
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Artifact storage backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Look up an artifact and its bytes
    async fn get(&self, id: &ContentReference) -> Result<Artifact, StorageError>;
    /// Store an artifact under its reference
    async fn put(&self, artifact: &Artifact) -> Result<(), StorageError>;
    /// Issue a signed URL for a bucket path
    async fn create_signed_url(&self, request: &SignedUrlRequest) -> Result<String, StorageError>;
    /// Upload raw bytes through a write URL
    async fn upload_to_signed_url(&self, url: &str, bytes: Bytes) -> Result<(), StorageError>;
}

/// Conversation history backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Last `limit` turns of a chat
    async fn load_history(&self, chat_id: &str, limit: usize)
        -> Result<Vec<ChatTurn>, StorageError>;
    /// Append turns to a chat's history
    async fn append_history(&self, chat_id: &str, turns: Vec<ChatTurn>)
        -> Result<(), StorageError>;
    /// Forget a chat's history
    async fn clear_history(&self, chat_id: &str) -> Result<(), StorageError>;
}

/// R2-backed storage implementation
pub struct R2Storage {
    client: Client,
    http: reqwest::Client,
    bucket: String,
    prefix: String,
    cache: Cache<String, Arc<Vec<u8>>>,
}

impl R2Storage {
    /// Create a new R2 storage instance rooted at the bucket top level
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &Settings) -> Result<Self, StorageError> {
        Self::with_prefix(settings, String::new()).await
    }

    /// Create a new R2 storage instance whose keys all live under `prefix`
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn with_prefix(settings: &Settings, prefix: String) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(60 * 60))
            .time_to_idle(Duration::from_secs(30 * 60))
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            http: reqwest::Client::new(),
            bucket: bucket.clone(),
            prefix,
            cache,
        })
    }

    fn key(&self, relative: &str) -> String {
        format!("{}{relative}", self.prefix)
    }

    /// Save data as JSON to R2
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization or S3 upload fails.
    pub async fn save_json<T: Serialize + Sync>(
        &self,
        key: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let key = self.key(key);
        let body_bytes = serde_json::to_vec_pretty(data)?;

        // Write-through
        self.cache
            .insert(key.clone(), Arc::new(body_bytes.clone()))
            .await;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body_bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        Ok(())
    }

    /// Load data from JSON in R2
    ///
    /// # Errors
    ///
    /// Returns an error if S3 download or JSON deserialization fails.
    pub async fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        let key = self.key(key);

        if let Some(cached_data) = self.cache.get(&key).await {
            match serde_json::from_slice(&cached_data) {
                Ok(data) => return Ok(Some(data)),
                Err(e) => {
                    warn!("Cache deserialization failed for {}: {}", key, e);
                    self.cache.invalidate(&key).await;
                }
            }
        }

        match self.get_object_bytes(&key).await {
            Ok(Some((data, _))) => {
                self.cache.insert(key, Arc::new(data.to_vec())).await;
                Ok(Some(serde_json::from_slice(&data)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete object from R2
    ///
    /// # Errors
    ///
    /// Returns an error if S3 deletion fails.
    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let key = self.key(key);
        self.cache.invalidate(&key).await;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        Ok(())
    }

    /// Delete every object under this instance's prefix
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deletion fails, or if this instance
    /// has no prefix (that would empty the whole bucket).
    pub async fn delete_prefix(&self) -> Result<usize, StorageError> {
        if self.prefix.is_empty() {
            return Err(StorageError::Config(
                "Refusing to delete objects without a prefix".into(),
            ));
        }

        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let page = request
                .send()
                .await
                .map_err(|e| StorageError::S3Put(e.to_string()))?;

            for key in page.contents().iter().filter_map(|o| o.key()) {
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| StorageError::S3Put(e.to_string()))?;
                deleted += 1;
            }

            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        self.cache.invalidate_all();
        debug!(prefix = %self.prefix, deleted, "Deleted objects under prefix");
        Ok(deleted)
    }

    /// Check connection to R2 storage
    ///
    /// # Errors
    ///
    /// Returns an error message if the bucket listing fails.
    pub async fn check_connection(&self) -> Result<(), String> {
        match self.client.list_buckets().send().await {
            Ok(_) => {
                info!("Successfully connected to R2 storage.");
                Ok(())
            }
            Err(e) => {
                let err_msg = format!("R2 connectivity test failed: {e:#?}");
                error!("{}", err_msg);
                Err(err_msg)
            }
        }
    }

    async fn get_object_bytes(
        &self,
        key: &str,
    ) -> Result<Option<(Bytes, Option<String>)>, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let content_type = output.content_type().map(ToString::to_string);
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
                    .into_bytes();
                Ok(Some((data, content_type)))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }
}

#[async_trait]
impl ArtifactStore for R2Storage {
    async fn get(&self, id: &ContentReference) -> Result<Artifact, StorageError> {
        let key = self.key(&artifact_key(id));
        let (bytes, content_type) = self
            .get_object_bytes(&key)
            .await?
            .ok_or(StorageError::NotFound(*id))?;

        Ok(Artifact {
            id: *id,
            mime_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes,
        })
    }

    async fn put(&self, artifact: &Artifact) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(&artifact_key(&artifact.id)))
            .body(ByteStream::from(artifact.bytes.clone()))
            .content_type(&artifact.mime_type)
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        debug!(id = %artifact.id, mime_type = %artifact.mime_type, size = artifact.bytes.len(), "Stored artifact");
        Ok(())
    }

    async fn create_signed_url(&self, request: &SignedUrlRequest) -> Result<String, StorageError> {
        let key = self.key(&format!("{}/{}", request.bucket.prefix(), request.path));
        let presigning = PresigningConfig::expires_in(Duration::from_secs(SIGNED_URL_TTL_SECS))
            .map_err(|e| StorageError::SignedUrl(e.to_string()))?;

        let presigned = match request.operation {
            SignedUrlOperation::Write => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .presigned(presigning)
                .await
                .map_err(|e| StorageError::SignedUrl(e.to_string()))?,
            SignedUrlOperation::Read => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .presigned(presigning)
                .await
                .map_err(|e| StorageError::SignedUrl(e.to_string()))?,
        };

        Ok(presigned.uri().to_string())
    }

    async fn upload_to_signed_url(&self, url: &str, bytes: Bytes) -> Result<(), StorageError> {
        self.http
            .put(url)
            .body(bytes)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| StorageError::Upload(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for R2Storage {
    async fn load_history(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatTurn>, StorageError> {
        let history: Vec<ChatTurn> = self
            .load_json(&history_key(chat_id))
            .await?
            .unwrap_or_default();
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].to_vec())
    }

    async fn append_history(
        &self,
        chat_id: &str,
        turns: Vec<ChatTurn>,
    ) -> Result<(), StorageError> {
        let key = history_key(chat_id);
        let mut history: Vec<ChatTurn> = self.load_json(&key).await?.unwrap_or_default();
        history.extend(turns);
        self.save_json(&key, &history).await
    }

    async fn clear_history(&self, chat_id: &str) -> Result<(), StorageError> {
        self.delete_object(&history_key(chat_id)).await
    }
}

/// Runs `f` against a throwaway storage workspace and deletes everything it
/// wrote once `f` completes, whatever its outcome. A panic in `f` is re-raised
/// after teardown.
///
/// # Errors
///
/// Returns an error if the workspace cannot be created. Teardown failures are
/// logged, not returned.
pub async fn with_temporary_workspace<F, Fut, T>(settings: &Settings, f: F) -> Result<T, StorageError>
where
    F: FnOnce(Arc<R2Storage>) -> Fut,
    Fut: Future<Output = T>,
{
    let prefix = format!("workspaces/{}/", Uuid::new_v4());
    let storage = Arc::new(R2Storage::with_prefix(settings, prefix.clone()).await?);
    info!(prefix = %prefix, "Created temporary workspace");

    let output = run_then_teardown(f(Arc::clone(&storage)), || async {
        match storage.delete_prefix().await {
            Ok(deleted) => info!(prefix = %prefix, deleted, "Removed temporary workspace"),
            Err(e) => warn!(prefix = %prefix, error = %e, "Failed to remove temporary workspace"),
        }
    })
    .await;
    Ok(output)
}

async fn run_then_teardown<Fut, T, D, DFut>(body: Fut, teardown: D) -> T
where
    Fut: Future<Output = T>,
    D: FnOnce() -> DFut,
    DFut: Future<Output = ()>,
{
    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    teardown().await;
    match outcome {
        Ok(output) => output,
        Err(panic) => resume_unwind(panic),
    }
}

/// Returns the R2 key of an artifact blob
#[must_use]
pub fn artifact_key(id: &ContentReference) -> String {
    format!("{}/{id}", Bucket::Blocks.prefix())
}

/// Returns the R2 key of a chat's history file
#[must_use]
pub fn history_key(chat_id: &str) -> String {
    format!("history/{chat_id}.json")
}
