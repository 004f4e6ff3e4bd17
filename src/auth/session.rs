use std::sync::Arc;

use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder};
use tokio::sync::RwLock;

use super::error::AuthError;
use super::oauth::OAuthClient;
use super::token::Token;

/// Authorized HTTP transport shared by every service client.
///
/// Cloning is cheap: the `reqwest::Client` and the token are both behind
/// `Arc`. The `RwLock` lets concurrent requests read the token while a
/// refresh takes it exclusively.
#[derive(Clone)]
pub struct AuthorizedSession {
    http: Client,
    oauth: Option<Arc<OAuthClient>>,
    token: Arc<RwLock<Token>>,
}

impl std::fmt::Debug for AuthorizedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedSession")
            .field("can_refresh", &self.oauth.is_some())
            .finish_non_exhaustive()
    }
}

impl AuthorizedSession {
    pub fn new(http: Client, oauth: Option<Arc<OAuthClient>>, token: Token) -> Self {
        Self {
            http,
            oauth,
            token: Arc::new(RwLock::new(token)),
        }
    }

    /// Session around a fixed access token, with no refresh capability.
    #[cfg(test)]
    pub fn with_static_token(http: Client, access_token: &str) -> Self {
        Self::new(http, None, Token::bearer(access_token))
    }

    /// Current access token, refreshed first if it has expired.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        {
            let token = self.token.read().await;
            if !token.is_expired(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut token = self.token.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if !token.is_expired(Utc::now()) {
            return Ok(token.access_token.clone());
        }

        let (oauth, refresh_token) = match (&self.oauth, &token.refresh_token) {
            (Some(oauth), Some(refresh)) => (oauth, refresh.clone()),
            _ => return Err(AuthError::NoRefreshToken),
        };
        tracing::debug!("Access token expired, refreshing");
        *token = oauth.refresh(&refresh_token).await?;
        Ok(token.access_token.clone())
    }

    /// Start a request carrying the bearer token.
    pub async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, AuthError> {
        let access_token = self.access_token().await?;
        tracing::debug!("{} {}", method, url);
        Ok(self.http.request(method, url).bearer_auth(access_token))
    }
}
