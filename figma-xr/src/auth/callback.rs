//! Localhost listener for the OAuth redirect.
//!
//! The authorization page redirects the browser to
//! `http://127.0.0.1:<port>/callback?code=...&state=...`. The first callback is
//! handed to the waiting login, after which the listener shuts down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const SUCCESS_PAGE: &str = "<!doctype html><html><body>\
    <h2>Signed in to Figma</h2><p>You can close this tab and return to the terminal.</p>\
    </body></html>";
const FAILURE_PAGE: &str = "<!doctype html><html><body>\
    <h2>Sign-in failed</h2><p>Return to the terminal for details.</p>\
    </body></html>";

/// Code and CSRF state delivered by the authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type CallbackSender = oneshot::Sender<Result<AuthorizationCallback>>;

/// Running callback listener.
pub struct CallbackServer {
    port: u16,
    rx: oneshot::Receiver<Result<AuthorizationCallback>>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl CallbackServer {
    /// Bind on `127.0.0.1:port`. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            Error::Navigation(format!("Failed to listen on {addr} for the OAuth callback: {e}"))
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::Navigation(format!("OAuth callback listener has no address: {e}")))?
            .port();

        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state: Arc<Mutex<Option<CallbackSender>>> = Arc::new(Mutex::new(Some(tx)));

        let app = Router::new()
            .route("/callback", get(callback_handler))
            .with_state(state);

        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                warn!("OAuth callback listener stopped: {e}");
            }
        });

        info!("OAuth callback listener on http://127.0.0.1:{port}/callback");
        Ok(Self {
            port,
            rx,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the first callback, then stop the listener.
    pub async fn wait(mut self, timeout: Duration) -> Result<AuthorizationCallback> {
        let received = tokio::time::timeout(timeout, &mut self.rx).await;
        self.stop().await;

        match received {
            Ok(Ok(callback)) => callback,
            Ok(Err(_)) => Err(Error::Navigation(
                "OAuth callback listener closed unexpectedly".to_string(),
            )),
            Err(_) => Err(Error::CallbackTimeout),
        }
    }

    async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            debug!("OAuth callback listener task ended abnormally: {e}");
        }
    }
}

async fn callback_handler(
    State(state): State<Arc<Mutex<Option<CallbackSender>>>>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let outcome = match params {
        CallbackParams {
            code: Some(code),
            state: Some(csrf),
            ..
        } => Ok(AuthorizationCallback { code, state: csrf }),
        CallbackParams {
            error: Some(error), ..
        } => Err(Error::RemoteApi(format!("Authorization denied: {error}"))),
        _ => Err(Error::RemoteApi(
            "Authorization callback is missing code or state".to_string(),
        )),
    };
    let page = if outcome.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };

    match state.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => debug!("Ignoring repeated OAuth callback"),
    }

    Html(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receives_code_and_state() {
        let server = CallbackServer::bind(0).await.unwrap();
        let url = format!(
            "http://127.0.0.1:{}/callback?code=abc&state=xyz",
            server.port()
        );

        let request = tokio::spawn(async move { reqwest::get(url).await.unwrap().text().await });
        let callback = server.wait(Duration::from_secs(5)).await.unwrap();

        assert_eq!(
            callback,
            AuthorizationCallback {
                code: "abc".to_string(),
                state: "xyz".to_string()
            }
        );
        let body = request.await.unwrap().unwrap();
        assert!(body.contains("Signed in"));
    }

    #[tokio::test]
    async fn test_denied_authorization() {
        let server = CallbackServer::bind(0).await.unwrap();
        let url = format!(
            "http://127.0.0.1:{}/callback?error=access_denied",
            server.port()
        );

        let request = tokio::spawn(async move { reqwest::get(url).await });
        let err = server.wait(Duration::from_secs(5)).await.unwrap_err();

        assert!(matches!(err, Error::RemoteApi(ref m) if m.contains("access_denied")));
        let _ = request.await;
    }

    #[tokio::test]
    async fn test_times_out_without_callback() {
        let server = CallbackServer::bind(0).await.unwrap();
        let err = server.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, Error::CallbackTimeout));
    }
}
