//! services/gallery/src/guard.rs
//!
//! Route guarding for the gallery's three screens.

use lecture_gallery_core::domain::CurrentUser;
use tracing::debug;

/// A screen of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Sign-in / sign-up. The only public route.
    Auth,
    /// The subject picker.
    Welcome,
    /// The gallery for one subject.
    Subject(String),
}

impl Route {
    /// Resolves a location path. Anything unrecognized lands on `Welcome`.
    pub fn resolve(path: &str) -> Self {
        let path = path.trim_start_matches('#');
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["auth"] => Route::Auth,
            ["subject", id] => Route::Subject((*id).to_string()),
            _ => Route::Welcome,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Auth => "/auth".to_string(),
            Route::Welcome => "/".to_string(),
            Route::Subject(id) => format!("/subject/{}", id),
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Auth)
    }
}

/// Where the user actually ends up when asking for `requested`.
pub fn guard(requested: Route, user: Option<&CurrentUser>) -> Route {
    if requested.is_protected() && user.is_none() {
        debug!("No user signed in; redirecting {} to /auth.", requested.path());
        return Route::Auth;
    }
    requested
}
