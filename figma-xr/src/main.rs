//! figma-xr - Figma OAuth session and frame cache for an AR viewer.
//!
//! Architecture:
//! - `auth` owns the OAuth session: login, code exchange, throttled token
//!   refresh and the refresh-then-retry wrapper for authenticated calls
//! - `store` owns the project cache and mirrors it to local storage
//! - The CLI drives both and stands in for the viewer's routes

mod api;
mod auth;
mod cli;
mod config;
mod error;
mod models;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    execute(cli).await
}
