//! Cloud Storage mirror: an existence probe followed by a media upload.

pub mod error;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use url::Url;

use self::error::StorageError;
use crate::auth::AuthorizedSession;

pub const GCS_API_BASE: &str = "https://storage.googleapis.com";

/// Object storage operations the mirror step needs.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Metadata probe. `Ok(false)` only for a definite "not found".
    async fn exists(&self, bucket: &str, object: &str) -> Result<bool, StorageError>;

    /// Write the whole object, overwriting any existing one.
    async fn put(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    AlreadyPresent,
    Uploaded,
}

/// Ensure `prefix/name` exists in `bucket`.
///
/// Without `always_upload` the object is probed first and left alone when
/// present. With it, the upload always happens.
pub async fn mirror_object(
    store: &dyn MirrorStore,
    bucket: &str,
    prefix: &str,
    name: &str,
    content_type: &str,
    bytes: &[u8],
    always_upload: bool,
) -> Result<MirrorOutcome, StorageError> {
    let object = object_path(prefix, name);

    if !always_upload && store.exists(bucket, &object).await? {
        tracing::info!(
            "File '{}' already exists in GCS {}. Skipping upload.",
            object,
            bucket
        );
        return Ok(MirrorOutcome::AlreadyPresent);
    }

    store.put(bucket, &object, content_type, bytes).await?;
    tracing::info!("uploaded to {}/{}", bucket, object);
    Ok(MirrorOutcome::Uploaded)
}

/// Join a folder prefix and an object name with single slashes. An empty
/// prefix puts the object at the bucket root.
pub fn object_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Cloud Storage JSON API client.
pub struct GcsMirror {
    session: AuthorizedSession,
    base_url: String,
}

impl GcsMirror {
    pub fn new(session: AuthorizedSession) -> Self {
        Self::with_base_url(session, GCS_API_BASE)
    }

    pub fn with_base_url(session: AuthorizedSession, base_url: &str) -> Self {
        Self {
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `<base>/<segments...>` with each segment percent-encoded, so object
    /// names containing `/` become a single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|_| StorageError::Endpoint(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Endpoint(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl MirrorStore for GcsMirror {
    async fn exists(&self, bucket: &str, object: &str) -> Result<bool, StorageError> {
        let url = self.url(&["storage", "v1", "b", bucket, "o", object])?;
        let response = self
            .session
            .request(Method::GET, url.as_str())
            .await?
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StorageError::ProbeStatus {
                bucket: bucket.to_string(),
                object: object.to_string(),
                status: s.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        object: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<(), StorageError> {
        let mut url = self.url(&["upload", "storage", "v1", "b", bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object);

        let response = self
            .session
            .request(Method::POST, url.as_str())
            .await?
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        // The upload is only committed once the service acknowledges it.
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::UploadStatus {
                bucket: bucket.to_string(),
                object: object.to_string(),
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
