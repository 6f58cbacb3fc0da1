//! Session model holding the OAuth tokens and login status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login status of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// No credentials.
    #[default]
    LoggedOut,
    /// Browser sent to the authorization page, waiting for the callback.
    LoggingIn,
    /// Holding a usable access token.
    LoggedIn,
    /// The last token exchange failed.
    Error,
}

impl AuthStatus {
    /// Convert status to string for display.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoggedOut => "logged out",
            Self::LoggingIn => "logging in",
            Self::LoggedIn => "logged in",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Profile of the authenticated user (`GET /v1/me`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub img_url: Option<String>,
}

/// OAuth session state. Created empty, populated by the code exchange,
/// refreshed in place and cleared on logout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// When the access token stops being valid.
    pub expires_at: Option<DateTime<Utc>>,
    /// CSRF `state` sent with the authorization request.
    pub csrf_nonce: Option<String>,
    pub status: AuthStatus,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

impl Session {
    /// Whether the access token has expired. A missing expiry counts as expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_none_or(|at| Utc::now() >= at)
    }

    /// `LoggedIn` with the token and expiry that status requires.
    pub const fn is_logged_in(&self) -> bool {
        matches!(self.status, AuthStatus::LoggedIn)
            && self.access_token.is_some()
            && self.expires_at.is_some()
    }

    /// Drop every field, returning to `LoggedOut`.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn logged_in(expires_at: DateTime<Utc>) -> Session {
        Session {
            access_token: Some("access".to_string()),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(expires_at),
            csrf_nonce: None,
            status: AuthStatus::LoggedIn,
            profile: None,
        }
    }

    #[test]
    fn test_session_expiry() {
        assert!(logged_in(Utc::now() - Duration::hours(1)).is_expired());
        assert!(!logged_in(Utc::now() + Duration::hours(1)).is_expired());
        assert!(Session::default().is_expired());
    }

    #[test]
    fn test_logged_in_requires_token_and_expiry() {
        let mut session = logged_in(Utc::now() + Duration::hours(1));
        assert!(session.is_logged_in());

        session.access_token = None;
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut session = logged_in(Utc::now());
        session.csrf_nonce = Some("nonce".to_string());
        session.clear();
        assert_eq!(session, Session::default());
        assert_eq!(session.status, AuthStatus::LoggedOut);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&AuthStatus::LoggingIn).unwrap();
        assert_eq!(json, "\"logging_in\"");
        assert_eq!(AuthStatus::LoggedIn.to_string(), "logged in");
    }
}
