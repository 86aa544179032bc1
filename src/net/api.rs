//! REST client for the admin backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every screen and the session store talk to the backend through one
//! [`ApiClient`]. Each request is decorated with the installed bearer token,
//! and any `401` is routed through the [`AuthInterceptor`] before the error
//! is handed back to the caller.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx replies become [`ApiError::Unauthorized`] or [`ApiError::Status`]
//! carrying the server's `message` when it sent one. Nothing here panics.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub use reqwest::Method;

use super::interceptor::{AuthInterceptor, RequestId};
use super::types::error_message;
use crate::config::ClientConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unauthorized: {}", .message.as_deref().unwrap_or("credential rejected"))]
    Unauthorized { message: Option<String> },
    #[error("server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status { status: u16, message: Option<String> },
    #[error("invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// HTTP status of the reply, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) | ApiError::InvalidBaseUrl(_) => None,
        }
    }

    /// The server's human-readable `message`, if it sent one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message } | ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// One logical request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    id: RequestId,
    method: Method,
    path: String,
    body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { id: RequestId::new(), method, path: path.into(), body: None }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] if `body` cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Reuse the identity of an earlier attempt, marking this as a retry.
    #[must_use]
    pub fn retry_of(mut self, id: RequestId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A 2xx reply. Empty bodies decode as `Value::Null`; non-JSON bodies as a
/// JSON string.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

// =============================================================================
// CLIENT
// =============================================================================

/// Cloneable HTTP client bound to one backend and one interceptor.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    interceptor: Arc<AuthInterceptor>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] if the configured URL does not
    /// parse, and [`ApiError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, interceptor: AuthInterceptor) -> Result<Self, ApiError> {
        let base_url = config.api_base_url();
        if reqwest::Url::parse(&base_url).is_err() {
            return Err(ApiError::InvalidBaseUrl(base_url));
        }
        let http = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, base_url, interceptor: Arc::new(interceptor) })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send `request`, decorating it with the bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] on network failure,
    /// [`ApiError::Unauthorized`] on `401` (after session teardown), and
    /// [`ApiError::Status`] for any other non-2xx reply.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self.http.request(request.method.clone(), self.url(&request.path));
        if let Some(authorization) = self.interceptor.authorization() {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = parse_body(&response.text().await?);
        debug!(
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "api response"
        );

        if status == StatusCode::UNAUTHORIZED {
            self.interceptor.on_unauthorized(request.id);
            return Err(ApiError::Unauthorized { message: error_message(&body) });
        }
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), message: error_message(&body) });
        }
        Ok(ApiResponse { status: status.as_u16(), body })
    }

    /// `GET path`, decoding the reply as `T`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); also [`ApiError::Decode`] if the body does not fit `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::get(path)).await?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    /// `POST path` without a body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::post(path)).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::delete(path)).await
    }

    /// `DELETE path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::delete(path).json(body)?).await
    }
}
