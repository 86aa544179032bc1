//! The currently installed bearer credential.
//!
//! DESIGN
//! ======
//! One `Credential` cell is created per client and handed to both the
//! session store and the request interceptor. Installing a token is
//! crate-private and only `state::auth` calls it; the interceptor is limited
//! to clearing the cell when the server rejects it.

#[cfg(test)]
#[path = "credential_test.rs"]
mod credential_test;

use std::sync::{Arc, PoisonError, RwLock};

/// Shared, cloneable handle to the installed bearer token.
#[derive(Clone, Default)]
pub struct Credential {
    inner: Arc<RwLock<Option<String>>>,
}

impl Credential {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a token is currently installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Current token, if any.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `Bearer <token>` header value for the installed token.
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.current().map(|token| format!("Bearer {token}"))
    }

    pub(crate) fn install(&self, token: &str) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_owned());
    }

    /// Remove the installed token. Returns whether one was present.
    pub(crate) fn clear(&self) -> bool {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).take().is_some()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("installed", &self.is_installed()).finish()
    }
}
