//! Route guard for protected screens.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every protected screen asks the guard before rendering. While the session
//! is still restoring the answer is `Loading` and nothing else happens, so a
//! user with a valid persisted session never sees a login redirect flash.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::sync::Arc;

use tracing::debug;

use super::{LOGIN_PATH, Navigator, Route};
use crate::state::session::{SessionHandle, SessionStatus};

/// What a screen should do for the current session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render only a neutral loading indicator.
    Loading,
    /// Send the user to `to`; `from` is where they were headed.
    Redirect { to: String, from: String },
    Render,
}

/// Pure decision for a protected location.
#[must_use]
pub fn decide(status: SessionStatus, requested: &str) -> GuardDecision {
    match status {
        SessionStatus::Restoring => GuardDecision::Loading,
        SessionStatus::Anonymous => GuardDecision::Redirect {
            to: LOGIN_PATH.to_owned(),
            from: requested.to_owned(),
        },
        SessionStatus::Authenticated => GuardDecision::Render,
    }
}

/// Guard bound to a session and a navigator.
#[derive(Clone)]
pub struct RouteGuard {
    session: SessionHandle,
    navigator: Arc<dyn Navigator>,
}

impl RouteGuard {
    pub fn new(session: SessionHandle, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    /// Decision for `location` against the current snapshot. Public routes
    /// always render.
    #[must_use]
    pub fn check(&self, location: &str) -> GuardDecision {
        if !Route::resolve(location).is_protected() {
            return GuardDecision::Render;
        }
        decide(self.session.status(), location)
    }

    /// Wait for restoration to settle, then decide. A redirect is also
    /// applied to the navigator.
    pub async fn admit(&self, location: &str) -> GuardDecision {
        if Route::resolve(location).is_protected() {
            self.session.wait_ready().await;
        }
        let decision = self.check(location);
        if let GuardDecision::Redirect { to, from } = &decision {
            debug!(%from, "guard redirecting anonymous visitor");
            self.navigator.navigate(to, Some(from));
        }
        decision
    }
}
