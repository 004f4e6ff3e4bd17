//! Ways of completing an OAuth authorization: browser redirect to a local
//! listener, a pasted code, or a token handed to us up front.

use std::io::{self, Write};
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::error::AuthError;
use super::oauth::OAuthClient;
use super::token::Token;

const CALLBACK_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);
const CALLBACK_REDIRECT_URI: &str = "http://localhost:8080";
const SUCCESS_PAGE: &str = "Authentication successful. You may close this browser window.\n";
const FAILURE_PAGE: &str = "Authentication failed. Return to the terminal for details.\n";

/// Completes authorization and returns a freshly minted token.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authorize(&self, oauth: &OAuthClient) -> Result<Token, AuthError>;

    /// Whether the minted token should be written to the token cache.
    fn persist(&self) -> bool {
        true
    }
}

/// Opens the consent page in the system browser and waits for the redirect
/// on a local listener.
pub struct BrowserCallback {
    addr: SocketAddr,
    redirect_uri: String,
}

impl Default for BrowserCallback {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(CALLBACK_ADDR),
            redirect_uri: CALLBACK_REDIRECT_URI.to_string(),
        }
    }
}

#[async_trait]
impl AuthorizationFlow for BrowserCallback {
    async fn authorize(&self, oauth: &OAuthClient) -> Result<Token, AuthError> {
        let state = Uuid::new_v4().to_string();
        let auth_url = oauth.consent_url(&self.redirect_uri, &state)?;

        // Bind before launching the browser so the redirect cannot race us.
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| AuthError::Listener(format!("bind {}: {}", self.addr, e)))?;
        tracing::info!("listening on {}", self.addr);

        tracing::info!("You will now be taken to your browser for authentication");
        open_browser(&auth_url).map_err(|e| AuthError::BrowserLaunch(e.to_string()))?;
        tracing::info!("Authentication URL: {}", auth_url);

        let code = listen_for_code(listener, state).await?;
        let token = oauth.exchange(&code, &self.redirect_uri).await?;
        tracing::info!("Authentication successful");
        Ok(token)
    }
}

/// Prints the consent URL and reads the authorization code from stdin.
pub struct ManualCode;

#[async_trait]
impl AuthorizationFlow for ManualCode {
    async fn authorize(&self, oauth: &OAuthClient) -> Result<Token, AuthError> {
        let redirect_uri = oauth.secret().manual_redirect_uri().to_string();
        let state = Uuid::new_v4().to_string();
        let auth_url = oauth.consent_url(&redirect_uri, &state)?;

        let input = tokio::task::spawn_blocking(move || {
            println!(
                "Go to the following link in your browser then type the authorization code:\n{}",
                auth_url
            );
            print!("Code: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok::<String, io::Error>(line)
        })
        .await
        .map_err(|e| AuthError::Io(io::Error::other(e)))??;

        let code = extract_pasted_code(&input).ok_or(AuthError::MissingCode)?;
        oauth.exchange(&code, &redirect_uri).await
    }
}

/// Uses an access token obtained elsewhere. It is never written to the
/// token cache and cannot be refreshed.
pub struct Presupplied {
    access_token: String,
}

impl Presupplied {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl AuthorizationFlow for Presupplied {
    async fn authorize(&self, _oauth: &OAuthClient) -> Result<Token, AuthError> {
        Ok(Token::bearer(self.access_token.clone()))
    }

    fn persist(&self) -> bool {
        false
    }
}

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    tx: mpsc::Sender<Result<String, AuthError>>,
}

/// Serve the redirect target until the first request to `/` arrives, then
/// shut the listener down and return the authorization code it carried.
pub(crate) async fn listen_for_code(
    listener: TcpListener,
    expected_state: String,
) -> Result<String, AuthError> {
    let (tx, mut rx) = mpsc::channel(1);
    let app = Router::new()
        .route("/", get(handle_callback))
        .with_state(CallbackState { expected_state, tx });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = rx.recv().await;
    let _ = shutdown_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Callback listener exited with error: {}", e),
        Err(e) => tracing::debug!("Callback listener task failed: {}", e),
    }

    outcome.unwrap_or(Err(AuthError::MissingCode))
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, &'static str) {
    let outcome = check_callback(&params, &state.expected_state);
    let reply = match &outcome {
        Ok(_) => (StatusCode::OK, SUCCESS_PAGE),
        Err(_) => (StatusCode::BAD_REQUEST, FAILURE_PAGE),
    };
    // Only the first redirect counts; later ones find the channel full.
    let _ = state.tx.try_send(outcome);
    reply
}

fn check_callback(params: &CallbackParams, expected_state: &str) -> Result<String, AuthError> {
    if let Some(error) = &params.error {
        return Err(AuthError::Denied(error.clone()));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }
    match params.code.as_deref() {
        Some(code) if !code.is_empty() => Ok(code.to_string()),
        _ => Err(AuthError::MissingCode),
    }
}

/// Accept either the bare code or the whole redirect URL pasted from the
/// browser's address bar.
fn extract_pasted_code(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = url::Url::parse(trimmed) {
        if url.has_host() {
            return url
                .query_pairs()
                .find(|(k, _)| k == "code")
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty());
        }
    }
    Some(trimmed.to_string())
}

fn open_browser(url: &str) -> io::Result<()> {
    use std::process::{Command, Stdio};

    #[cfg(target_os = "macos")]
    let mut cmd = {
        let mut c = Command::new("open");
        c.arg(url);
        c
    };
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut c = Command::new("rundll32");
        c.arg("url.dll,FileProtocolHandler").arg(url);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut cmd = {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };

    cmd.stdout(Stdio::null()).stderr(Stdio::null()).spawn()?;
    Ok(())
}
