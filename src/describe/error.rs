use std::path::PathBuf;

use thiserror::Error;

use crate::auth::error::AuthError;

/// Prompt template failures. These end up in the report as error text.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read prompt template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unterminated action at byte {offset} in prompt template")]
    Unterminated { offset: usize },

    #[error("unknown template field {0:?}; only .ImageName is available")]
    UnknownField(String),
}

/// Model invocation failures.
#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("generateContent returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode generateContent response: {0}")]
    Decode(String),

    #[error("Invalid model endpoint {0}")]
    Endpoint(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
