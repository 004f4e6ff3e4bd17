use thiserror::Error;

use crate::auth::error::AuthError;

/// Errors from the Cloud Storage mirror.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to check object existence gs://{bucket}/{object} (HTTP {status}): {message}")]
    ProbeStatus {
        bucket: String,
        object: String,
        status: u16,
        message: String,
    },

    #[error("failed to write gs://{bucket}/{object} (HTTP {status}): {message}")]
    UploadStatus {
        bucket: String,
        object: String,
        status: u16,
        message: String,
    },

    #[error("Invalid storage endpoint {0}")]
    Endpoint(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
