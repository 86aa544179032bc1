//! Dashboard statistics and the newsletter action.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::AdminError;
use crate::net::api::{ApiRequest, ApiResponse};
use crate::resource::{RefreshTask, Resource, ResourceState};

pub const STATISTICS_PATH: &str = "/admin/statistics";
pub const NEWSLETTER_PATH: &str = "/admin/send-newsletter";
pub const EXPORT_REPORTS_PATH: &str = "/admin/export-reports";
/// File name the dashboard offers for the export.
pub const REPORTS_FILE_NAME: &str = "reports.csv";

/// Aggregate counters as the backend reports them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statistics(pub Map<String, Value>);

impl Statistics {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Integer counter under `key`, if present.
    #[must_use]
    pub fn count(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }
}

pub struct StatisticsScreen {
    resource: Resource<Statistics>,
}

impl StatisticsScreen {
    pub(crate) fn new(resource: Resource<Statistics>) -> Self {
        Self { resource }
    }

    #[must_use]
    pub fn resource(&self) -> &Resource<Statistics> {
        &self.resource
    }

    pub async fn load(&self) -> ResourceState<Statistics> {
        self.resource.load().await
    }

    /// Periodic revalidation while the dashboard is open.
    #[must_use]
    pub fn watch(&self) -> Option<RefreshTask> {
        self.resource.spawn_refresh_loop()
    }

    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn send_newsletter(&self) -> Result<ApiResponse, AdminError> {
        let api = self.resource.api();
        let response = self.resource.mutate(api.post(NEWSLETTER_PATH)).await?;
        info!("newsletter sent");
        Ok(response)
    }

    /// Download the reports export as text. Not cached.
    ///
    /// # Errors
    ///
    /// Returns the request's error.
    pub async fn export_reports(&self) -> Result<String, AdminError> {
        let response = self.resource.api().send(ApiRequest::get(EXPORT_REPORTS_PATH)).await?;
        let report = match response.body {
            Value::Null => String::new(),
            Value::String(text) => text,
            other => other.to_string(),
        };
        info!(bytes = report.len(), "reports exported");
        Ok(report)
    }
}
