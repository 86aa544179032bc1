//! Client configuration loaded from the environment.
//!
//! SYSTEM CONTEXT
//! ==============
//! The binary loads `.env` first, then builds a [`ClientConfig`] from
//! `EXAM_ADMIN_*` variables; CLI flags override individual fields.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_APP_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const STATE_DIR_NAME: &str = ".exam-admin";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("app URL must start with http:// or https://: {0}")]
    InvalidAppUrl(String),
}

/// Connection and storage settings for one admin client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin, without the `/api` suffix.
    pub app_url: String,
    /// Directory holding the persisted credential record.
    pub state_dir: PathBuf,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Build a config for `app_url` with default storage and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAppUrl`] if the URL has no http(s) scheme.
    pub fn new(app_url: impl Into<String>) -> Result<Self, ConfigError> {
        let app_url = normalize_app_url(&app_url.into())?;
        Ok(Self {
            app_url,
            state_dir: default_state_dir(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Load from `EXAM_ADMIN_APP_URL`, `EXAM_ADMIN_STATE_DIR` and
    /// `EXAM_ADMIN_TIMEOUT_SECS`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAppUrl`] if `EXAM_ADMIN_APP_URL` is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_url = std::env::var("EXAM_ADMIN_APP_URL").unwrap_or_else(|_| DEFAULT_APP_URL.to_owned());
        let mut config = Self::new(app_url)?;
        if let Ok(dir) = std::env::var("EXAM_ADMIN_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        config.request_timeout = Duration::from_secs(env_parse("EXAM_ADMIN_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));
        Ok(config)
    }

    /// REST base URL: every endpoint path is appended to this.
    #[must_use]
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.app_url)
    }
}

fn normalize_app_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidAppUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

fn default_state_dir() -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(STATE_DIR_NAME))
        .unwrap_or_else(|_| PathBuf::from(STATE_DIR_NAME))
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
