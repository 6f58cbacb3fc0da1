//! Error taxonomy shared by the auth manager, the API client and the project cache.

/// Errors surfaced by session and project operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid Figma URL: {0}")]
    InvalidUrl(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Security error: state mismatch")]
    StateMismatch,

    #[error("No refresh token available, please sign in again")]
    NoRefreshToken,

    #[error("Too many token refresh attempts")]
    TooManyRetries,

    #[error("Not authenticated")]
    NotAuthenticated,

    /// Network failure (`status` is `None`) or a non-2xx response.
    #[error("Transport error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A successful response carrying a JSON `err` field.
    #[error("Figma API error: {0}")]
    RemoteApi(String),

    /// A response body that could not be decoded.
    #[error("Malformed response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Timed out waiting for the OAuth callback")]
    CallbackTimeout,
}

impl Error {
    /// Network failures and 401/403 responses can be cured by a token refresh.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                status: None | Some(401 | 403),
                ..
            }
        )
    }

    /// Whether the remote API reported the resource as missing.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                status: Some(404),
                ..
            }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::InvalidResponse(e.to_string());
        }
        Self::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        let network = Error::Transport {
            status: None,
            message: "connection refused".to_string(),
        };
        let unauthorized = Error::Transport {
            status: Some(403),
            message: "Invalid token".to_string(),
        };
        let missing = Error::Transport {
            status: Some(404),
            message: "Not found".to_string(),
        };

        assert!(network.is_recoverable());
        assert!(unauthorized.is_recoverable());
        assert!(!missing.is_recoverable());
        assert!(missing.is_not_found());
        assert!(!Error::RemoteApi("bad ids".to_string()).is_recoverable());
        assert!(!Error::TooManyRetries.is_recoverable());
        assert!(!Error::InvalidResponse("expected value".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Transport {
            status: Some(401),
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "Transport error (401): Unauthorized");

        let err = Error::Transport {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Transport error: timeout");
        assert_eq!(
            Error::StateMismatch.to_string(),
            "Security error: state mismatch"
        );
    }
}
