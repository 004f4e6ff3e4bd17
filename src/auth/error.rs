use thiserror::Error;

/// Errors raised while obtaining or refreshing OAuth credentials.
///
/// Every variant is fatal to the run: there is no recovery path once
/// authorization fails.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unable to read client secret file {path}: {source}")]
    ClientSecretRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Unable to parse client secret file to config: {0}")]
    ClientSecretParse(String),

    #[error("Unable to read token cache {path}: {reason}")]
    TokenCache { path: String, reason: String },

    #[error("Unable to open browser: {0}")]
    BrowserLaunch(String),

    #[error("Callback listener failed: {0}")]
    Listener(String),

    #[error("No code in exchange")]
    MissingCode,

    #[error("OAuth state mismatch in redirect")]
    StateMismatch,

    #[error("Authorization denied: {0}")]
    Denied(String),

    #[error("Token endpoint error (HTTP {code}): {message}")]
    TokenEndpoint { code: u16, message: String },

    #[error("Access token expired and no refresh token is available")]
    NoRefreshToken,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
