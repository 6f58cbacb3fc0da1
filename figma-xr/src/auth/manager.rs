//! Authentication manager - OAuth login/logout, token refresh and the
//! refresh-then-retry wrapper used by authenticated API calls.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::guard::{guard, Route};
use super::navigator::Navigator;
use crate::api::{FigmaClient, TokenResponse};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{AuthStatus, Session};
use crate::store::{KeyValueStore, ProjectCache, SESSION_KEY};

/// Minimum spacing between two token refresh attempts.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

const NONCE_LEN: usize = 32;

/// First eight characters of a secret, for logs. Cuts on a char boundary.
fn preview(secret: &str) -> &str {
    secret
        .char_indices()
        .nth(8)
        .map_or(secret, |(idx, _)| &secret[..idx])
}

/// Owns the OAuth session and every transition of it.
pub struct AuthManager {
    config: Config,
    client: FigmaClient,
    store: Arc<dyn KeyValueStore>,
    projects: Arc<ProjectCache>,
    navigator: Arc<dyn Navigator>,
    session: RwLock<Session>,
    last_refresh: Mutex<Option<Instant>>,
}

impl AuthManager {
    /// Create a manager, restoring any persisted session.
    pub fn new(
        config: Config,
        client: FigmaClient,
        store: Arc<dyn KeyValueStore>,
        projects: Arc<ProjectCache>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let session = match store.get(SESSION_KEY) {
            Ok(Some(json)) => serde_json::from_str::<Session>(&json).unwrap_or_else(|e| {
                error!("Stored session is unreadable ({e}), starting logged out");
                Session::default()
            }),
            Ok(None) => Session::default(),
            Err(e) => {
                error!("Failed to load stored session: {e}. Starting fresh.");
                Session::default()
            }
        };
        debug!("Restored session with status: {}", session.status);

        Self {
            config,
            client,
            store,
            projects,
            navigator,
            session: RwLock::new(session),
            last_refresh: Mutex::new(None),
        }
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn status(&self) -> AuthStatus {
        self.session.read().await.status
    }

    /// The route actually entered when navigating to `route`.
    pub async fn guard(&self, route: Route) -> Route {
        guard(route, self.status().await)
    }

    /// Current access token, if logged in.
    pub async fn access_token(&self) -> Result<String> {
        let session = self.session.read().await;
        if !session.is_logged_in() {
            return Err(Error::NotAuthenticated);
        }
        session.access_token.clone().ok_or(Error::NotAuthenticated)
    }

    /// Authorization page URL carrying the given CSRF state.
    pub fn authorization_url(&self, state: &str) -> String {
        let redirect_uri = self.config.redirect_uri();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", self.config.scope.as_str()),
            ("state", state),
            ("response_type", "code"),
        ];
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{query}", self.config.authorize_url)
    }

    /// Start the authorization-code flow: store a fresh CSRF nonce and send the
    /// user to the authorization page. Returns the URL navigated to.
    pub async fn login(&self) -> Result<String> {
        let nonce: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        let url = self.authorization_url(&nonce);

        {
            let mut session = self.session.write().await;
            session.csrf_nonce = Some(nonce);
            session.status = AuthStatus::LoggingIn;
            self.persist(&session);
        }

        info!("Starting OAuth sign-in");
        self.navigator.redirect(&url)?;
        Ok(url)
    }

    /// Finish the flow with the `state` and `code` from the redirect.
    ///
    /// A state that does not match the stored nonce logs out and fails with
    /// [`Error::StateMismatch`]. A failed exchange leaves the session in `Error`.
    pub async fn complete_authorization(&self, received_state: &str, code: &str) -> Result<()> {
        let expected = self.session.read().await.csrf_nonce.clone();
        if expected.as_deref() != Some(received_state) {
            error!(
                "State mismatch: expected {}..., got {}...",
                expected.as_deref().map_or("<none>", preview),
                preview(received_state)
            );
            self.logout().await;
            return Err(Error::StateMismatch);
        }

        info!("Exchanging authorization code {}...", preview(code));
        let token = match self.client.exchange_code(&self.config, code).await {
            Ok(token) => token,
            Err(e) => {
                error!("Failed to exchange authorization code: {e}");
                let mut session = self.session.write().await;
                session.status = AuthStatus::Error;
                self.persist(&session);
                return Err(e);
            }
        };

        let access_token = token.access_token.clone();
        {
            let mut session = self.session.write().await;
            apply_token(&mut session, token);
            session.csrf_nonce = None;
            session.status = AuthStatus::LoggedIn;
            self.persist(&session);
        }
        info!("Signed in");

        match self.client.get_me(&access_token).await {
            Ok(profile) => {
                let mut session = self.session.write().await;
                session.profile = Some(profile);
                self.persist(&session);
            }
            Err(e) => warn!("Failed to fetch user profile (non-fatal): {e}"),
        }

        Ok(())
    }

    /// Run `op` with the current access token. If it fails with a network or
    /// auth error, refresh the token once and run it again through
    /// [`Self::refresh_and_retry`]; a second failure is returned as is.
    pub async fn with_refresh_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.access_token().await?;
        match op(token).await {
            Err(e) if e.is_recoverable() => {
                warn!("Authenticated call failed ({e}), refreshing token and retrying");
                self.refresh_and_retry(op).await
            }
            other => other,
        }
    }

    /// Refresh the access token, then invoke `op` with the new token.
    ///
    /// Fails with [`Error::NoRefreshToken`] without a refresh token and with
    /// [`Error::TooManyRetries`] when called again within
    /// [`MIN_REFRESH_INTERVAL`]; both log out, as does a failed refresh.
    pub async fn refresh_and_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.refresh().await?;
        op(token).await
    }

    async fn refresh(&self) -> Result<String> {
        let refresh_token = self.session.read().await.refresh_token.clone();
        let Some(refresh_token) = refresh_token else {
            warn!("No refresh token, logging out");
            self.logout().await;
            return Err(Error::NoRefreshToken);
        };

        {
            let mut last = self.last_refresh.lock().await;
            if last.is_some_and(|at| at.elapsed() < MIN_REFRESH_INTERVAL) {
                drop(last);
                warn!("Token refresh requested again too soon, logging out");
                self.logout().await;
                return Err(Error::TooManyRetries);
            }
            *last = Some(Instant::now());
        }

        debug!("Refreshing access token");
        match self.client.refresh_token(&self.config, &refresh_token).await {
            Ok(token) => {
                let access_token = token.access_token.clone();
                let mut session = self.session.write().await;
                apply_token(&mut session, token);
                session.status = AuthStatus::LoggedIn;
                self.persist(&session);
                info!("Token refreshed successfully");
                Ok(access_token)
            }
            Err(e) => {
                warn!("Token refresh failed: {e}");
                self.logout().await;
                Err(e)
            }
        }
    }

    /// Validate a logged-in session: refresh an expired token, then re-fetch the
    /// profile. Does nothing unless logged in; any failure logs out.
    pub async fn check_session(&self) -> Result<()> {
        let session = self.session().await;
        if session.status != AuthStatus::LoggedIn {
            return Ok(());
        }

        let token = if session.is_expired() {
            info!("Access token expired, refreshing");
            // A failed refresh has already logged out.
            self.refresh().await?
        } else {
            match session.access_token {
                Some(token) => token,
                None => {
                    self.logout().await;
                    return Err(Error::NotAuthenticated);
                }
            }
        };

        match self.client.get_me(&token).await {
            Ok(profile) => {
                let mut session = self.session.write().await;
                session.profile = Some(profile);
                self.persist(&session);
                Ok(())
            }
            Err(e) => {
                warn!("Profile check failed ({e}), logging out");
                self.logout().await;
                Err(e)
            }
        }
    }

    /// Clear the session and the project cache, then return to the landing view.
    pub async fn logout(&self) {
        info!("Logging out");
        self.session.write().await.clear();
        if let Err(e) = self.store.remove(SESSION_KEY) {
            warn!("Failed to remove stored session: {e}");
        }
        self.projects.clear_all().await;
        self.navigator.landing();
    }

    /// Mirror the session to storage. Failures are logged; memory stays authoritative.
    fn persist(&self, session: &Session) {
        let result = serde_json::to_string(session)
            .map_err(Error::from)
            .and_then(|json| self.store.set(SESSION_KEY, &json));
        if let Err(e) = result {
            warn!("Failed to store session: {e}");
        }
    }
}

/// Copy a token response into the session. The old refresh token is kept when
/// the response carries none.
fn apply_token(session: &mut Session, token: TokenResponse) {
    session.access_token = Some(token.access_token);
    if let Some(refresh) = token.refresh_token {
        session.refresh_token = Some(refresh);
    }
    session.expires_at = Some(Utc::now() + chrono::Duration::seconds(token.expires_in));
}
