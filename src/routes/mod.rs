//! Screen routes and navigation.
//!
//! ARCHITECTURE
//! ============
//! `Route` enumerates the admin screens and knows which are public. The
//! [`Navigator`] trait abstracts "where the user is" so the interceptor and
//! the guard can redirect without depending on a concrete shell.

pub mod guard;


use std::sync::{Mutex, PoisonError};

/// Unauthenticated entry view.
pub const LOGIN_PATH: &str = "/login";

/// Admin screens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    ForgotPassword,
    Dashboard,
    Users,
    Exams,
    Tests,
    Statistics,
    Settings,
    Support,
}

impl Route {
    pub const ALL: [Route; 10] = [
        Route::Login,
        Route::Register,
        Route::ForgotPassword,
        Route::Dashboard,
        Route::Users,
        Route::Exams,
        Route::Tests,
        Route::Statistics,
        Route::Settings,
        Route::Support,
    ];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => LOGIN_PATH,
            Route::Register => "/register",
            Route::ForgotPassword => "/forgot-password",
            Route::Dashboard => "/",
            Route::Users => "/users",
            Route::Exams => "/exams",
            Route::Tests => "/tests",
            Route::Statistics => "/statistics",
            Route::Settings => "/settings",
            Route::Support => "/support",
        }
    }

    /// Whether the screen requires an authenticated session.
    #[must_use]
    pub fn is_protected(self) -> bool {
        !matches!(self, Route::Login | Route::Register | Route::ForgotPassword)
    }

    /// Resolve a location (path plus optional query/fragment) to a screen.
    /// Unknown paths land on the entry view.
    #[must_use]
    pub fn resolve(location: &str) -> Route {
        let path = strip_query(location);
        let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };
        Route::ALL
            .into_iter()
            .find(|route| route.path() == path)
            .unwrap_or(Route::Login)
    }
}

fn strip_query(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = &location[..end];
    if path.is_empty() { "/" } else { path }
}

/// Whether `location` is the entry view itself.
#[must_use]
pub fn is_login_location(location: &str) -> bool {
    strip_query(location) == LOGIN_PATH
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Current location plus the ability to move the user elsewhere.
pub trait Navigator: Send + Sync {
    fn current(&self) -> String;

    /// Replace the current location. `from` carries the location the user
    /// was sent away from, when there is one.
    fn navigate(&self, to: &str, from: Option<&str>);
}

/// A recorded navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Visit {
    pub location: String,
    pub from: Option<String>,
}

/// History kept in memory. Used by the CLI and tests.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<Vec<Visit>>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(start: &str) -> Self {
        Self { history: Mutex::new(vec![Visit { location: start.to_owned(), from: None }]) }
    }

    #[must_use]
    pub fn history(&self) -> Vec<Visit> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The `from` recorded with the latest navigation.
    #[must_use]
    pub fn return_to(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .and_then(|visit| visit.from.clone())
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map_or_else(|| "/".to_owned(), |visit| visit.location.clone())
    }

    fn navigate(&self, to: &str, from: Option<&str>) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Visit { location: to.to_owned(), from: from.map(str::to_owned) });
    }
}
