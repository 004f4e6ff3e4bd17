use chrono::Utc;
use reqwest::Client;

use super::error::AuthError;
use super::secret::ClientSecret;
use super::token::{Token, TokenResponse};

/// Drive access for listing/downloading, plus cloud-platform so the same
/// credential reaches Cloud Storage and Vertex AI.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/cloud-platform",
];

/// Talks to the OAuth2 authorization and token endpoints of one client
/// registration.
pub struct OAuthClient {
    secret: ClientSecret,
    http: Client,
}

impl OAuthClient {
    pub fn new(secret: ClientSecret, http: Client) -> Self {
        Self { secret, http }
    }

    pub fn secret(&self) -> &ClientSecret {
        &self.secret
    }

    /// Consent page URL requesting offline access (so a refresh token is
    /// issued) for [`SCOPES`].
    pub fn consent_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
        let scope = SCOPES.join(" ");
        let url = url::Url::parse_with_params(
            &self.secret.auth_uri,
            &[
                ("access_type", "offline"),
                ("client_id", self.secret.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::ClientSecretParse(format!("invalid auth_uri: {}", e)))?;
        Ok(url.to_string())
    }

    /// Trade an authorization code for a token.
    pub async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<Token, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ];
        let response = self.token_request(&form).await?;
        Ok(response.into_token(Utc::now(), None))
    }

    /// Mint a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
        ];
        let response = self.token_request(&form).await?;
        Ok(response.into_token(Utc::now(), Some(refresh_token.to_string())))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        tracing::debug!("POST {}", self.secret.token_uri);
        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                code: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<TokenResponse>().await?)
    }
}
