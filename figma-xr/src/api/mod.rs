//! Figma REST API client.

mod client;
mod types;

pub use client::FigmaClient;
pub use types::TokenResponse;
