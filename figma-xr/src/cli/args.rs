//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_API_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_REDIRECT_PORT, DEFAULT_SCOPE};

/// figma-xr - Sign in to Figma and cache file frames for AR viewing
#[derive(Parser, Debug)]
#[command(name = "figma-xr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// OAuth application client id
    #[arg(long, env = "FIGMA_CLIENT_ID", global = true, default_value = "")]
    pub client_id: String,

    /// OAuth application client secret
    #[arg(
        long,
        env = "FIGMA_CLIENT_SECRET",
        global = true,
        default_value = "",
        hide_env_values = true
    )]
    pub client_secret: String,

    /// Base URL of the Figma REST API
    #[arg(long, env = "FIGMA_API_URL", global = true, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Authorization page URL
    #[arg(long, global = true, default_value = DEFAULT_AUTHORIZE_URL, hide = true)]
    pub authorize_url: String,

    /// OAuth scopes (comma-separated)
    #[arg(long, global = true, default_value = DEFAULT_SCOPE, hide = true)]
    pub scope: String,

    /// Port of the local OAuth callback listener (must match the registered redirect URI)
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_REDIRECT_PORT,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: u16,

    /// Directory for the stored session and project cache (default: ~/.figma-xr)
    #[arg(long, env = "FIGMA_XR_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in through the browser
    Login,

    /// Sign out and clear the project cache
    Logout,

    /// Validate the session and show the signed-in user
    Status,

    /// Add (or refresh) a project from a Figma file URL
    Add {
        /// File URL, e.g. https://www.figma.com/design/<key>/<name>
        url: String,
    },

    /// List cached projects
    List,

    /// Show a project and its frames
    Show {
        /// Project id (file key) or file URL
        id: String,
    },

    /// Download the next frames that have no image yet
    Fetch {
        /// Project id (file key) or file URL
        id: String,

        /// Number of frames to download
        #[arg(short, long, default_value = "3")]
        count: usize,

        /// Keep going until every frame has an image
        #[arg(long)]
        all: bool,
    },

    /// Remove a project from the cache
    Remove {
        /// Project id (file key) or file URL
        id: String,
    },

    /// Re-check every cached project against Figma
    Sync,

    /// Remove every cached project
    Clear,
}
