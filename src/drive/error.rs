use thiserror::Error;

use crate::auth::error::AuthError;

/// Errors from the Drive listing and download calls.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Drive API error (HTTP {status}) listing folder {folder}: {message}")]
    ListStatus {
        status: u16,
        folder: String,
        message: String,
    },

    #[error("HTTP status code {status} downloading {name}")]
    DownloadStatus { status: u16, name: String },

    #[error("Unable to read response body for {name}: {source}")]
    Body {
        name: String,
        source: reqwest::Error,
    },

    #[error("Invalid Drive endpoint {0}")]
    Endpoint(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
