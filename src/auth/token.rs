use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::error::AuthError;

/// Tokens are treated as expired this long before their real expiry so an
/// in-flight request never carries a token that lapses mid-call.
const EXPIRY_SKEW_SECS: i64 = 10;

/// OAuth2 credential as persisted in the token cache.
///
/// Field names match the JSON written by the common OAuth2 client libraries
/// so an existing `token.json` keeps working.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl Token {
    /// A bare access token with no refresh capability or known expiry.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: None,
            expiry: None,
        }
    }

    /// Whether the token must be refreshed before use.
    ///
    /// A missing expiry, or a zero-value expiry written by other clients
    /// (`0001-01-01T00:00:00Z`), means the token never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) if expiry > DateTime::<Utc>::UNIX_EPOCH => {
                expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now
            }
            _ => false,
        }
    }
}

/// Wire format of a token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert into a [`Token`], keeping `previous_refresh` when the endpoint
    /// did not rotate the refresh token (the usual case for refresh grants).
    pub fn into_token(self, now: DateTime<Utc>, previous_refresh: Option<String>) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry: self
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| now + Duration::seconds(secs)),
        }
    }
}

/// Read a cached token. Missing and unparsable files are both reported as
/// errors; the caller decides whether that means "no token yet".
pub async fn load(path: &Path) -> Result<Token, AuthError> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| AuthError::TokenCache {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    serde_json::from_str(&contents).map_err(|e| AuthError::TokenCache {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Persist a token, truncating any previous cache.
pub async fn save(path: &Path, token: &Token) -> Result<(), AuthError> {
    tracing::info!("Saving credential file to: {}", path.display());
    let json = serde_json::to_string_pretty(token)?;
    fs::write(path, json).await?;
    #[cfg(unix)]
    {
        // Token files carry bearer credentials; owner-only
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}
