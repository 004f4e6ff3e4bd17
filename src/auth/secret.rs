use std::path::Path;

use serde::Deserialize;

use super::error::AuthError;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client registration as downloaded from the Cloud console.
#[derive(Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecret")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// The console wraps the registration in `installed` (desktop apps) or
/// `web` (web apps).
#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub async fn from_file(path: &Path) -> Result<Self, AuthError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| AuthError::ClientSecretRead {
                    path: path.display().to_string(),
                    source,
                })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, AuthError> {
        let file: ClientSecretFile = serde_json::from_str(contents)
            .map_err(|e| AuthError::ClientSecretParse(e.to_string()))?;
        let secret = file.installed.or(file.web).ok_or_else(|| {
            AuthError::ClientSecretParse("missing \"installed\" or \"web\" section".into())
        })?;
        if secret.client_id.is_empty() {
            return Err(AuthError::ClientSecretParse("empty client_id".into()));
        }
        Ok(secret)
    }

    /// Redirect URI for the paste-the-code flow: the first registered one.
    pub fn manual_redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost")
    }
}
