//! Request decoration and unauthorized-response teardown.
//!
//! DESIGN
//! ======
//! The interceptor is built once with the credential cell, the persisted
//! store, the session snapshot and a navigator, then injected into
//! [`ApiClient`](super::api::ApiClient). It never decides that a login
//! succeeded; it only cleans up when the server says the credential is bad.
//!
//! Teardown runs at most once per [`RequestId`]. The guard remembers a
//! bounded window of recent ids so a request that is retried under the same
//! id cannot loop back into teardown.

#[cfg(test)]
#[path = "interceptor_test.rs"]
mod interceptor_test;

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;
use uuid::Uuid;

use super::credential::Credential;
use crate::routes::{LOGIN_PATH, Navigator, is_login_location};
use crate::state::session::SessionHandle;
use crate::state::storage::CredentialStore;

const HANDLED_CAPACITY: usize = 256;

/// Identity of one logical request. Retries reuse the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// ONE-SHOT GUARD
// =============================================================================

/// Bounded set of request ids whose teardown already ran.
#[derive(Debug)]
struct OneShot {
    seen: HashSet<RequestId>,
    order: VecDeque<RequestId>,
    capacity: usize,
}

impl OneShot {
    fn new(capacity: usize) -> Self {
        Self { seen: HashSet::new(), order: VecDeque::new(), capacity }
    }

    /// True the first time `id` is claimed.
    fn claim(&mut self, id: RequestId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

// =============================================================================
// INTERCEPTOR
// =============================================================================

pub struct AuthInterceptor {
    credential: Credential,
    store: CredentialStore,
    session: SessionHandle,
    navigator: Arc<dyn Navigator>,
    handled: Mutex<OneShot>,
}

impl AuthInterceptor {
    pub fn new(
        credential: Credential,
        store: CredentialStore,
        session: SessionHandle,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            credential,
            store,
            session,
            navigator,
            handled: Mutex::new(OneShot::new(HANDLED_CAPACITY)),
        }
    }

    /// `Authorization` header value for the next request, if a token is installed.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        self.credential.authorization_header()
    }

    /// React to a `401` for request `id`. Returns whether teardown ran.
    pub fn on_unauthorized(&self, id: RequestId) -> bool {
        let first = self
            .handled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .claim(id);
        if !first {
            return false;
        }

        let had_token = self.credential.clear();
        self.store.clear_logged();
        self.session.reset_anonymous();
        info!(request_id = %id, had_token, "unauthorized response; session cleared");

        if !is_login_location(&self.navigator.current()) {
            self.navigator.navigate(LOGIN_PATH, None);
        }
        true
    }
}
