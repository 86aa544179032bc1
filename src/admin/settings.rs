//! Settings screen: the signed-in admin's own profile, password and account.
//!
//! Unlike the other screens this one has no cached read. It works on the
//! session identity directly: a profile save re-reads `/auth/me`, and a
//! deleted account ends the session and returns the user to `/login`.

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::net::api::{ApiClient, ApiError, ApiResponse};
use crate::net::types::User;
use crate::resource::ResourceCache;
use crate::routes::{LOGIN_PATH, Navigator};
use crate::state::auth::SessionStore;
use crate::state::session::SessionStatus;

pub const PROFILE_PATH: &str = "/user/profile";
pub const CHANGE_PASSWORD_PATH: &str = "/admin/change-password";
pub const ACCOUNT_PATH: &str = "/admin/account";

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Password must be at least 6 characters long")]
    PasswordTooShort,
    #[error("New passwords do not match")]
    PasswordMismatch,
    #[error("no signed-in user id")]
    NoIdentity,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SettingsError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SettingsError::Api(e) if e.is_unauthorized())
    }

    /// Message for the form: validation text or the server's `message`.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            SettingsError::Api(e) => e.server_message().map_or_else(|| e.to_string(), str::to_owned),
            other => other.to_string(),
        }
    }
}

/// Body of `PUT /user/profile`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub mobile: String,
}

impl ProfileUpdate {
    /// Form prefilled from `identity`; missing fields are blank.
    #[must_use]
    pub fn from_identity(identity: &User) -> Self {
        Self {
            name: identity.name.clone().unwrap_or_default(),
            email: identity.email.clone().unwrap_or_default(),
            mobile: identity.mobile.clone().unwrap_or_default(),
        }
    }
}

/// Password form. Only `current_password` and `new_password` are sent.
#[derive(Clone, Default)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

impl PasswordChange {
    /// # Errors
    ///
    /// [`SettingsError::PasswordTooShort`] below six characters, then
    /// [`SettingsError::PasswordMismatch`] if the confirmation differs.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SettingsError::PasswordTooShort);
        }
        if self.new_password != self.confirm_password {
            return Err(SettingsError::PasswordMismatch);
        }
        Ok(())
    }
}

pub struct SettingsScreen {
    sessions: SessionStore,
    cache: ResourceCache,
    navigator: Arc<dyn Navigator>,
}

impl SettingsScreen {
    pub fn new(sessions: SessionStore, cache: ResourceCache, navigator: Arc<dyn Navigator>) -> Self {
        Self { sessions, cache, navigator }
    }

    fn api(&self) -> &ApiClient {
        self.cache.api()
    }

    /// Profile form for the current identity.
    #[must_use]
    pub fn profile(&self) -> ProfileUpdate {
        self.sessions
            .session()
            .identity
            .as_ref()
            .map(ProfileUpdate::from_identity)
            .unwrap_or_default()
    }

    fn identity_id(&self) -> Result<String, SettingsError> {
        self.sessions
            .session()
            .identity
            .and_then(|identity| identity.id)
            .filter(|id| !id.trim().is_empty())
            .ok_or(SettingsError::NoIdentity)
    }

    /// Save the profile, then re-read the session identity.
    ///
    /// # Errors
    ///
    /// Returns the write's error; the identity is not refreshed in that case.
    pub async fn update_profile(&self, profile: &ProfileUpdate) -> Result<SessionStatus, SettingsError> {
        self.api().put_json(PROFILE_PATH, profile).await?;
        info!("profile updated");
        Ok(self.sessions.refresh_identity().await)
    }

    /// # Errors
    ///
    /// Local validation errors before any request, [`SettingsError::NoIdentity`]
    /// without a signed-in user id, otherwise the request's error.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<ApiResponse, SettingsError> {
        change.validate()?;
        let id = self.identity_id()?;
        let body = json!({
            "currentPassword": change.current_password,
            "newPassword": change.new_password,
            "id": id,
        });
        let response = self.api().put_json(CHANGE_PASSWORD_PATH, &body).await?;
        info!("password changed");
        Ok(response)
    }

    /// Delete the signed-in account. On success the local session is
    /// discarded, cached screen data dropped and the user sent to `/login`.
    ///
    /// # Errors
    ///
    /// [`SettingsError::NoIdentity`] without a signed-in user id, otherwise
    /// the request's error. A failed delete leaves the session alone.
    pub async fn delete_account(&self) -> Result<ApiResponse, SettingsError> {
        let id = self.identity_id()?;
        let response = self
            .api()
            .delete_json(ACCOUNT_PATH, &json!({ "id": id }))
            .await
            .inspect_err(|e| warn!(error = %e, "account deletion failed"))?;

        self.sessions.discard();
        self.cache.clear();
        self.navigator.navigate(LOGIN_PATH, None);
        info!("account deleted");
        Ok(response)
    }
}
