//! Route gating on login status.

use crate::models::AuthStatus;

/// Views of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Unauthenticated landing view.
    Landing,
    /// Project list.
    Projects,
    /// AR view of one project.
    XrView(String),
}

impl Route {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Landing => "landingpage",
            Self::Projects => "projects",
            Self::XrView(_) => "xrview",
        }
    }

    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::Projects | Self::XrView(_))
    }
}

/// Resolve the route actually entered: protected routes fall back to the landing view
/// unless the session is logged in.
pub fn guard(route: Route, status: AuthStatus) -> Route {
    if route.requires_login() && status != AuthStatus::LoggedIn {
        Route::Landing
    } else {
        route
    }
}
