//! Admin screen bindings.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each screen reads one cached resource and writes through the shared
//! [`ApiClient`](crate::net::api::ApiClient). A successful write refreshes
//! the screen's read; a failed one leaves it alone.
//!
//! | Screen     | Read                                | Writes                               |
//! |------------|-------------------------------------|--------------------------------------|
//! | users      | `/admin/users?page={p}&limit={l}`   | `PUT /admin/users/{id}`              |
//! | exams      | `/exams`                            | `POST/PUT/DELETE /admin/exams[/{id}]`|
//! | tests      | `/admin/tests`                      | `POST/PUT/DELETE /admin/tests[/{id}]`|
//! | statistics | `/admin/statistics`                 | `POST /admin/send-newsletter`        |
//!
//! [`settings`] is the exception: it has no cached read and acts on the
//! session identity instead. Report export is a plain uncached download.


pub mod exams;
pub mod settings;
pub mod statistics;
pub mod users;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::net::api::{ApiError, ApiResponse};
use crate::resource::{Resource, ResourceCache, ResourceOptions};

use self::exams::ExamList;
use self::practice_tests::PracticeTest;
use self::statistics::{Statistics, StatisticsScreen};
use self::users::UsersScreen;

const CATALOG_DEDUPE: Duration = Duration::from_secs(60);
const STATISTICS_REFRESH: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("record has no id")]
    MissingId,
}

impl AdminError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AdminError::Api(e) if e.is_unauthorized())
    }
}

pub(crate) fn require_id(id: &str) -> Result<&str, AdminError> {
    let id = id.trim();
    if id.is_empty() { Err(AdminError::MissingId) } else { Ok(id) }
}

/// One page of `items`, 1-based. Page `0` reads as page `1`; past the end is empty.
#[must_use]
pub fn paginate<T>(items: &[T], page: usize, limit: usize) -> &[T] {
    if limit == 0 {
        return &[];
    }
    let start = page.max(1).saturating_sub(1).saturating_mul(limit);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(limit).min(items.len());
    &items[start..end]
}

/// Page count for `total` items, never less than one.
#[must_use]
pub fn total_pages(total: usize, limit: usize) -> usize {
    if limit == 0 { 1 } else { total.div_ceil(limit).max(1) }
}

// =============================================================================
// CRUD SCREEN
// =============================================================================

/// A list read plus create/update/delete under `write_base`.
pub struct CrudScreen<T> {
    resource: Resource<T>,
    write_base: &'static str,
}

impl<T: DeserializeOwned> CrudScreen<T> {
    #[must_use]
    pub fn resource(&self) -> &Resource<T> {
        &self.resource
    }

    fn item_path(&self, id: &str) -> Result<String, AdminError> {
        Ok(format!("{}/{}", self.write_base, require_id(id)?))
    }

    /// # Errors
    ///
    /// Returns the write's [`ApiError`].
    pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> Result<ApiResponse, AdminError> {
        let api = self.resource.api();
        let response = self.resource.mutate(api.post_json(self.write_base, body)).await?;
        info!(path = self.write_base, "record created");
        Ok(response)
    }

    /// # Errors
    ///
    /// [`AdminError::MissingId`] for a blank id, otherwise the write's error.
    pub async fn update<B: Serialize + ?Sized>(&self, id: &str, body: &B) -> Result<ApiResponse, AdminError> {
        let path = self.item_path(id)?;
        let api = self.resource.api();
        let response = self.resource.mutate(api.put_json(&path, body)).await?;
        info!(%path, "record updated");
        Ok(response)
    }

    /// # Errors
    ///
    /// [`AdminError::MissingId`] for a blank id, otherwise the write's error.
    pub async fn delete(&self, id: &str) -> Result<ApiResponse, AdminError> {
        let path = self.item_path(id)?;
        let api = self.resource.api();
        let response = self.resource.mutate(api.delete(&path)).await?;
        info!(%path, "record deleted");
        Ok(response)
    }
}

// =============================================================================
// SCREENS
// =============================================================================

/// Factory for the admin screens over one cache.
#[derive(Clone)]
pub struct AdminScreens {
    cache: ResourceCache,
}

impl AdminScreens {
    pub fn new(cache: ResourceCache) -> Self {
        Self { cache }
    }

    #[must_use]
    pub fn users(&self, page: usize, limit: usize) -> UsersScreen {
        let key = format!("{}?page={}&limit={limit}", users::USERS_PATH, page.max(1));
        let options = ResourceOptions::default().without_focus_revalidation();
        UsersScreen::new(self.cache.resource(key, options))
    }

    #[must_use]
    pub fn exams(&self) -> CrudScreen<ExamList> {
        let options = ResourceOptions::default()
            .with_dedupe_interval(CATALOG_DEDUPE)
            .without_focus_revalidation();
        CrudScreen { resource: self.cache.resource(exams::EXAMS_PATH, options), write_base: exams::EXAMS_WRITE_PATH }
    }

    #[must_use]
    pub fn tests(&self) -> CrudScreen<Vec<PracticeTest>> {
        let options = ResourceOptions::default()
            .with_dedupe_interval(CATALOG_DEDUPE)
            .without_focus_revalidation();
        CrudScreen {
            resource: self.cache.resource(practice_tests::TESTS_PATH, options),
            write_base: practice_tests::TESTS_PATH,
        }
    }

    #[must_use]
    pub fn statistics(&self) -> StatisticsScreen {
        let options = ResourceOptions::default()
            .with_refresh_interval(STATISTICS_REFRESH)
            .without_focus_revalidation();
        StatisticsScreen::new(self.cache.resource::<Statistics>(statistics::STATISTICS_PATH, options))
    }
}
