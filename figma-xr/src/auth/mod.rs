//! OAuth session management.

mod callback;
mod guard;
mod manager;
mod navigator;

pub use callback::CallbackServer;
pub use guard::Route;
pub use manager::AuthManager;
pub use navigator::BrowserNavigator;
#[cfg(test)]
pub use navigator::Navigator;
