//! Runtime configuration for the Figma OAuth client and local storage.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default local port for the OAuth redirect listener.
pub const DEFAULT_REDIRECT_PORT: u16 = 58231;
pub const DEFAULT_API_URL: &str = "https://api.figma.com";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.figma.com/oauth";
pub const DEFAULT_SCOPE: &str = "current_user:read,file_content:read";

const DATA_DIR: &str = ".figma-xr";

/// Client configuration, assembled from CLI flags and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret.
    pub client_secret: String,
    /// Base URL of the REST API (no trailing slash).
    pub api_base_url: String,
    /// Authorization page the browser is sent to.
    pub authorize_url: String,
    /// Comma-separated OAuth scopes.
    pub scope: String,
    /// Port of the local callback listener.
    pub redirect_port: u16,
    /// Directory holding the persisted session and project cache.
    pub data_dir: PathBuf,
}

impl Config {
    /// Redirect URI registered with the OAuth application.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.redirect_port)
    }

    /// Default data directory (`~/.figma-xr`).
    pub fn default_data_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(DATA_DIR))
    }

    /// Configuration pointing every endpoint at `base_url`, used against mock servers.
    #[cfg(test)]
    pub fn for_tests(base_url: &str) -> Self {
        Self {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            api_base_url: base_url.trim_end_matches('/').to_string(),
            authorize_url: format!("{}/oauth", base_url.trim_end_matches('/')),
            scope: DEFAULT_SCOPE.to_string(),
            redirect_port: DEFAULT_REDIRECT_PORT,
            data_dir: std::env::temp_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_uri_uses_port() {
        let mut config = Config::for_tests("http://localhost:1234/");
        config.redirect_port = 9000;
        assert_eq!(config.redirect_uri(), "http://127.0.0.1:9000/callback");
        assert_eq!(config.api_base_url, "http://localhost:1234");
    }
}
