//! Session store: restore, refresh, login, logout.
//!
//! SYSTEM CONTEXT
//! ==============
//! The single source of truth for who is logged in. It is the only component
//! that installs a bearer token, and the only one that moves the session out
//! of `Restoring`. The interceptor may tear a session down on `401`; every
//! other reader goes through [`SessionHandle`] snapshots.
//!
//! ERROR HANDLING
//! ==============
//! `login` reports failures as [`LoginError`]. `restore`, `refresh_identity`
//! and `logout` never fail past their boundary; their outcome is the
//! resulting [`SessionStatus`]. Storage errors are logged and tolerated.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{info, warn};

use super::session::{Session, SessionHandle, SessionStatus};
use super::storage::CredentialStore;
use crate::net::api::{ApiClient, ApiError};
use crate::net::credential::Credential;
use crate::net::types::{LoginRequest, MissingToken, User, parse_login_response};

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";
pub const ME_ENDPOINT: &str = "/auth/me";

const GENERIC_LOGIN_FAILURE: &str = "Login failed";

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error(transparent)]
    MissingToken(#[from] MissingToken),
    #[error("login request failed: {0}")]
    Api(#[from] ApiError),
}

impl LoginError {
    /// Inline message for the login form: the server's `message`, or a
    /// generic fallback.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            LoginError::Api(e) => e.server_message().unwrap_or(GENERIC_LOGIN_FAILURE),
            LoginError::MissingToken(_) => GENERIC_LOGIN_FAILURE,
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    api: ApiClient,
    credential: Credential,
    storage: CredentialStore,
    session: SessionHandle,
    restored: Arc<AtomicBool>,
}

impl SessionStore {
    pub fn new(api: ApiClient, credential: Credential, storage: CredentialStore, session: SessionHandle) -> Self {
        Self { api, credential, storage, session, restored: Arc::new(AtomicBool::new(false)) }
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    #[must_use]
    pub fn handle(&self) -> &SessionHandle {
        &self.session
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub async fn wait_ready(&self) -> SessionStatus {
        self.session.wait_ready().await
    }

    /// Rebuild the session from storage. Runs once per store; later calls
    /// return the current status without touching the network.
    pub async fn restore(&self) -> SessionStatus {
        if self.restored.swap(true, Ordering::SeqCst) {
            return self.session.status();
        }

        let persisted = self.storage.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read persisted credentials");
            None
        });
        let Some(persisted) = persisted else {
            info!("no persisted session");
            self.session.reset_anonymous();
            return SessionStatus::Anonymous;
        };

        self.session.set_restoring(&persisted.token, persisted.identity);
        self.credential.install(&persisted.token);
        self.refresh_identity().await
    }

    /// Re-read the identity from `/auth/me`.
    ///
    /// A `401` tears the session down. Any other failure keeps the session
    /// so a flaky network does not log the user out.
    pub async fn refresh_identity(&self) -> SessionStatus {
        let Some(token) = self.credential.current() else {
            self.session.reset_anonymous();
            return SessionStatus::Anonymous;
        };

        let result = self.api.get_json::<User>(ME_ENDPOINT).await;

        if self.credential.current().as_deref() != Some(token.as_str()) {
            // Logged out or replaced while the request was in flight.
            return self.session.status();
        }

        match result {
            Ok(identity) => {
                if let Err(e) = self.storage.save_identity(&identity) {
                    warn!(error = %e, "failed to persist refreshed identity");
                }
                info!(user = %identity.display_name(), "identity refreshed");
                self.session.set_authenticated(&token, identity);
                SessionStatus::Authenticated
            }
            Err(e) if e.is_unauthorized() => {
                info!("credential rejected during identity refresh");
                self.teardown();
                SessionStatus::Anonymous
            }
            Err(e) => {
                warn!(error = %e, "identity refresh failed; keeping session");
                if let Some(identity) = self.session.snapshot().identity {
                    self.session.set_authenticated(&token, identity);
                    SessionStatus::Authenticated
                } else {
                    info!("no identity to fall back on; clearing session");
                    self.teardown();
                    SessionStatus::Anonymous
                }
            }
        }
    }

    /// Exchange credentials for a bearer token.
    ///
    /// On failure any previous session is cleared as well.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Api`] if the request fails or is rejected, and
    /// [`LoginError::MissingToken`] if a 2xx reply carries no token.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<User, LoginError> {
        match self.request_login(credentials).await {
            Ok((token, identity)) => {
                if let Err(e) = self.storage.save(&token, &identity) {
                    warn!(error = %e, "failed to persist session");
                }
                self.credential.install(&token);
                self.session.set_authenticated(&token, identity.clone());
                info!(user = %identity.display_name(), "login succeeded");
                Ok(identity)
            }
            Err(e) => {
                self.teardown();
                warn!(error = %e, email = %credentials.email, "login failed");
                Err(e)
            }
        }
    }

    async fn request_login(&self, credentials: &LoginRequest) -> Result<(String, User), LoginError> {
        let response = self.api.post_json(LOGIN_ENDPOINT, credentials).await?;
        let parsed = parse_login_response(&response.body)?;
        let identity = parsed.identity.unwrap_or_else(|| {
            warn!("login reply carried no user record");
            User::from_email(&credentials.email)
        });
        Ok((parsed.token, identity))
    }

    /// Tell the backend, then clear local state regardless of the outcome.
    pub async fn logout(&self) {
        if let Err(e) = self.api.post(LOGOUT_ENDPOINT).await {
            warn!(error = %e, "logout request failed; clearing local session anyway");
        }
        self.teardown();
        info!("logged out");
    }

    /// Clear the local session without calling the backend. Used once the
    /// account behind the session no longer exists.
    pub fn discard(&self) {
        self.teardown();
        info!("session discarded");
    }

    fn teardown(&self) {
        self.credential.clear();
        self.storage.clear_logged();
        self.session.reset_anonymous();
    }
}
