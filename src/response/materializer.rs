//! Content materialization
//!
//! Turns a content reference into a publicly fetchable, time-limited URL by
//! copying the artifact to a fresh random path and signing a read URL for it.

use super::reference::ContentReference;
use crate::storage::{ArtifactStore, Bucket, SignedUrlOperation, SignedUrlRequest, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors raised while materializing a reference
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// Artifact lookup failed
    #[error("failed to load artifact {id}: {source}")]
    Lookup {
        /// Reference being materialized
        id: ContentReference,
        /// Underlying storage error
        #[source]
        source: StorageError,
    },
    /// Signed URL issuance or upload failed
    #[error("failed to publish artifact {id}: {source}")]
    Publish {
        /// Reference being materialized
        id: ContentReference,
        /// Underlying storage error
        #[source]
        source: StorageError,
    },
}

/// Time-limited read URL for one published artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLocator {
    /// Read URL
    pub url: String,
    /// MIME type of the artifact behind the URL
    pub mime_type: String,
}

/// Publishes stored artifacts through signed URLs
#[derive(Clone)]
pub struct ContentMaterializer {
    store: Arc<dyn ArtifactStore>,
}

impl ContentMaterializer {
    /// Create a materializer over an artifact store
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Publishes the artifact behind `reference` and returns a read locator.
    ///
    /// A new random path is used on every call; locators are never reused.
    ///
    /// # Errors
    ///
    /// Returns `MaterializeError` if the artifact cannot be loaded, a signed
    /// URL cannot be issued, or the upload fails.
    pub async fn materialize(
        &self,
        reference: &ContentReference,
    ) -> Result<SignedLocator, MaterializeError> {
        let artifact = self
            .store
            .get(reference)
            .await
            .map_err(|source| MaterializeError::Lookup {
                id: *reference,
                source,
            })?;

        let path = format!("{}.{}", Uuid::new_v4(), extension_for(&artifact.mime_type));
        let publish_err = |source| MaterializeError::Publish {
            id: *reference,
            source,
        };

        let write_url = self
            .store
            .create_signed_url(&SignedUrlRequest {
                bucket: Bucket::PluginData,
                path: path.clone(),
                operation: SignedUrlOperation::Write,
            })
            .await
            .map_err(publish_err)?;
        debug!(id = %reference, path = %path, "Got signed url for uploading artifact");

        self.store
            .upload_to_signed_url(&write_url, artifact.bytes)
            .await
            .map_err(publish_err)?;

        let read_url = self
            .store
            .create_signed_url(&SignedUrlRequest {
                bucket: Bucket::PluginData,
                path: path.clone(),
                operation: SignedUrlOperation::Read,
            })
            .await
            .map_err(publish_err)?;

        info!(id = %reference, path = %path, mime_type = %artifact.mime_type, "Published artifact");

        Ok(SignedLocator {
            url: read_url,
            mime_type: artifact.mime_type,
        })
    }
}

/// File extension derived from a MIME subtype (`image/png` -> `png`)
fn extension_for(mime_type: &str) -> &str {
    mime_type
        .split_once('/')
        .map(|(_, subtype)| subtype.split(';').next().unwrap_or(subtype).trim())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin")
}
