//! Application wiring.
//!
//! SYSTEM CONTEXT
//! ==============
//! [`AdminApp`] builds the component graph once: the credential cell is
//! shared by the session store (writer) and the interceptor (reader and
//! clearer); the session handle is shared by the store, the interceptor and
//! the guard. Nothing else holds mutable auth state.
//!
//! ```text
//!   SessionStore ──install──▶ Credential ◀──read/clear── AuthInterceptor ◀── ApiClient
//!        │                                                    │
//!        └──────────────▶ SessionHandle (watch) ◀─────────────┘
//!                               ▲
//!                           RouteGuard
//! ```

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::sync::Arc;

use crate::admin::AdminScreens;
use crate::admin::settings::SettingsScreen;
use crate::config::ClientConfig;
use crate::net::account::AccountApi;
use crate::net::api::{ApiClient, ApiError};
use crate::net::credential::Credential;
use crate::net::interceptor::AuthInterceptor;
use crate::net::types::{LoginRequest, User};
use crate::resource::ResourceCache;
use crate::routes::guard::{GuardDecision, RouteGuard};
use crate::routes::{Navigator, Route};
use crate::state::auth::{LoginError, SessionStore};
use crate::state::session::{SessionHandle, SessionStatus};
use crate::state::storage::{CredentialStore, KeyValueStore};

#[derive(Clone)]
pub struct AdminApp {
    sessions: SessionStore,
    guard: RouteGuard,
    api: ApiClient,
    resources: ResourceCache,
    navigator: Arc<dyn Navigator>,
}

impl AdminApp {
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        kv: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let credential = Credential::new();
        let session = SessionHandle::new();
        let storage = CredentialStore::new(kv);
        let interceptor =
            AuthInterceptor::new(credential.clone(), storage.clone(), session.clone(), Arc::clone(&navigator));
        let api = ApiClient::new(config, interceptor)?;
        let sessions = SessionStore::new(api.clone(), credential, storage, session.clone());
        let guard = RouteGuard::new(session, Arc::clone(&navigator));
        let resources = ResourceCache::new(api.clone());

        Ok(Self { sessions, guard, api, resources, navigator })
    }

    /// Restore the persisted session. Call once at startup.
    pub async fn boot(&self) -> SessionStatus {
        self.sessions.restore().await
    }

    #[must_use]
    pub fn session_store(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    #[must_use]
    pub fn admin(&self) -> AdminScreens {
        AdminScreens::new(self.resources.clone())
    }

    #[must_use]
    pub fn settings(&self) -> SettingsScreen {
        SettingsScreen::new(self.sessions.clone(), self.resources.clone(), Arc::clone(&self.navigator))
    }

    #[must_use]
    pub fn account(&self) -> AccountApi {
        AccountApi::new(self.api.clone())
    }

    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Guard decision for `route`, waiting out restoration.
    pub async fn open(&self, route: Route) -> GuardDecision {
        self.guard.admit(route.path()).await
    }

    /// Log in with a fresh cache.
    ///
    /// # Errors
    ///
    /// See [`SessionStore::login`].
    pub async fn login(&self, credentials: &LoginRequest) -> Result<User, LoginError> {
        self.resources.clear();
        self.sessions.login(credentials).await
    }

    /// Log out and drop cached screen data.
    pub async fn logout(&self) {
        self.sessions.logout().await;
        self.resources.clear();
    }
}
