//! Users screen: server-paged list, client-side search, inline edit.

#[cfg(test)]
#[path = "users_test.rs"]
mod users_test;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AdminError, require_id};
use crate::net::api::ApiResponse;
use crate::net::types::User;
use crate::resource::{Resource, ResourceState};

pub const USERS_PATH: &str = "/admin/users";
pub const PAGE_LIMIT: usize = 10;

/// `GET /admin/users` reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default = "one", rename = "totalPages")]
    pub total_pages: usize,
}

fn one() -> usize {
    1
}

/// Case-insensitive substring match over name, email and mobile. A blank
/// term matches everyone.
#[must_use]
pub fn filter_users<'a>(users: &'a [User], term: &str) -> Vec<&'a User> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return users.iter().collect();
    }
    users
        .iter()
        .filter(|user| {
            [&user.name, &user.email, &user.mobile]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

pub struct UsersScreen {
    resource: Resource<UsersPage>,
}

impl UsersScreen {
    pub(crate) fn new(resource: Resource<UsersPage>) -> Self {
        Self { resource }
    }

    #[must_use]
    pub fn resource(&self) -> &Resource<UsersPage> {
        &self.resource
    }

    pub async fn load(&self) -> ResourceState<UsersPage> {
        self.resource.load().await
    }

    /// `PUT /admin/users/{id}` with the edited record, then refresh the page.
    ///
    /// # Errors
    ///
    /// [`AdminError::MissingId`] if the record has no id, otherwise the
    /// write's error.
    pub async fn update(&self, user: &User) -> Result<ApiResponse, AdminError> {
        let id = require_id(user.id.as_deref().unwrap_or_default())?;
        let path = format!("{USERS_PATH}/{id}");
        let api = self.resource.api();
        let response = self.resource.mutate(api.put_json(&path, user)).await?;
        info!(user = %user.display_name(), "user updated");
        Ok(response)
    }
}
