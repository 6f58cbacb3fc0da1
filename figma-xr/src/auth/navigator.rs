//! Where the user is sent when the session changes.

use tracing::{info, warn};

use crate::error::Result;

/// Navigation side effects of the auth flow.
pub trait Navigator: Send + Sync {
    /// Send the user to an external authorization page.
    fn redirect(&self, url: &str) -> Result<()>;

    /// Return to the unauthenticated landing view.
    fn landing(&self);
}

/// Opens the system browser and reports on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn redirect(&self, url: &str) -> Result<()> {
        println!("Opening browser to sign in to Figma...");
        println!("If nothing opens, visit:\n  {url}");
        if let Err(e) = open::that(url) {
            warn!("Failed to open browser: {e}");
        }
        Ok(())
    }

    fn landing(&self) {
        info!("Session cleared");
        println!("Signed out. Run `figma-xr login` to sign in again.");
    }
}
