//! Google OAuth2 credentials for the Drive, Cloud Storage and Vertex AI
//! clients.
//!
//! The credential store moves from `NoToken` to `HasToken` either by reading
//! the token cache or by running an [`AuthorizationFlow`] and persisting the
//! result. Everything downstream only sees an [`AuthorizedSession`].

pub mod error;
pub mod flow;
pub mod oauth;
pub mod secret;
pub mod session;
pub mod token;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;

use self::error::AuthError;
use self::flow::{AuthorizationFlow, BrowserCallback, ManualCode, Presupplied};
use self::oauth::OAuthClient;
use self::secret::ClientSecret;
pub use self::session::AuthorizedSession;
use self::token::Token;
use crate::types::AuthMode;

/// Credential store state.
#[derive(Debug)]
pub enum TokenState {
    NoToken,
    HasToken(Token),
}

/// Owns the token cache file and the token it holds.
pub struct CredentialStore {
    path: PathBuf,
    state: TokenState,
}

impl CredentialStore {
    /// Open the store, loading the cached token when it is present and
    /// parseable. Anything else starts in `NoToken`.
    pub async fn open(path: &Path) -> Self {
        let state = match token::load(path).await {
            Ok(token) => {
                tracing::debug!("Loaded cached token from {}", path.display());
                TokenState::HasToken(token)
            }
            Err(e) => {
                tracing::debug!("No usable cached token: {}", e);
                TokenState::NoToken
            }
        };
        Self {
            path: path.to_path_buf(),
            state,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &TokenState {
        &self.state
    }

    /// Return the held token, running `flow` to mint one if there is none.
    pub async fn ensure_token(
        &mut self,
        oauth: &OAuthClient,
        flow: &dyn AuthorizationFlow,
    ) -> Result<Token, AuthError> {
        if let TokenState::HasToken(token) = &self.state {
            return Ok(token.clone());
        }

        let token = flow.authorize(oauth).await?;
        if flow.persist() {
            token::save(&self.path, &token).await?;
        }
        self.state = TokenState::HasToken(token.clone());
        Ok(token)
    }
}

fn flow_for(mode: &AuthMode) -> Box<dyn AuthorizationFlow> {
    match mode {
        AuthMode::BrowserCallback => Box::new(BrowserCallback::default()),
        AuthMode::ManualCode => Box::new(ManualCode),
        AuthMode::Presupplied(token) => Box::new(Presupplied::new(token.clone())),
    }
}

/// Top-level authorization.
///
/// 1. Reads the OAuth client registration.
/// 2. With a pre-supplied token, uses it as-is (no cache read or write).
/// 3. Otherwise loads the cached token or runs the interactive flow.
/// 4. Returns a session that refreshes the token when it expires.
pub async fn authenticate(
    http: &Client,
    client_secret_path: &Path,
    token_file: &Path,
    mode: &AuthMode,
) -> Result<AuthorizedSession> {
    let secret = ClientSecret::from_file(client_secret_path)
        .await
        .context("Unable to load OAuth client secret")?;
    let oauth = Arc::new(OAuthClient::new(secret, http.clone()));
    let flow = flow_for(mode);

    let token = if matches!(mode, AuthMode::Presupplied(_)) {
        flow.authorize(&oauth).await?
    } else {
        let mut store = CredentialStore::open(token_file).await;
        store
            .ensure_token(&oauth, flow.as_ref())
            .await
            .context("Authorization failed")?
    };

    let refresher = token.refresh_token.is_some().then_some(oauth);
    Ok(AuthorizedSession::new(http.clone(), refresher, token))
}
