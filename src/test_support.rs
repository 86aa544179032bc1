//! In-process mock backend for HTTP-level tests.
//!
//! Binds an axum server to `127.0.0.1:0` and answers `/api/*` requests from
//! a table of canned replies keyed by method and path-with-query. Every
//! request is recorded with its `Authorization` header.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::app::AdminApp;
use crate::config::ClientConfig;
use crate::routes::MemoryNavigator;
use crate::state::storage::MemoryStore;

#[derive(Clone)]
struct Canned {
    status: u16,
    body: Value,
    delay: Option<Duration>,
}

#[derive(Clone, Debug)]
pub(crate) struct Hit {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    routes: Mutex<HashMap<(String, String), Canned>>,
    hits: Mutex<Vec<Hit>>,
}

pub(crate) struct MockBackend {
    app_url: String,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let router = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self { app_url: format!("http://{addr}"), state, server }
    }

    pub(crate) fn app_url(&self) -> &str {
        &self.app_url
    }

    pub(crate) fn config(&self) -> ClientConfig {
        ClientConfig::new(self.app_url.clone()).unwrap()
    }

    pub(crate) fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.insert(method, path, Canned { status, body, delay: None });
    }

    pub(crate) fn respond_after(&self, method: &str, path: &str, delay: Duration, status: u16, body: Value) {
        self.insert(method, path, Canned { status, body, delay: Some(delay) });
    }

    fn insert(&self, method: &str, path: &str, canned: Canned) {
        self.state
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((method.to_owned(), path.to_owned()), canned);
    }

    pub(crate) fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn hit_count(&self, method: &str, path: &str) -> usize {
        self.hits()
            .iter()
            .filter(|hit| hit.method == method && hit.path == path)
            .count()
    }

    pub(crate) fn last_hit(&self, method: &str, path: &str) -> Option<Hit> {
        self.hits()
            .into_iter()
            .rev()
            .find(|hit| hit.method == method && hit.path == path)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let full = uri.path_and_query().map_or_else(|| uri.path().to_owned(), ToString::to_string);
    let path = full.strip_prefix("/api").unwrap_or(&full).to_owned();
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);

    state.hits.lock().unwrap_or_else(PoisonError::into_inner).push(Hit {
        method: method.to_string(),
        path: path.clone(),
        authorization,
        body,
    });

    let canned = state
        .routes
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&(method.to_string(), path))
        .cloned();

    let Some(canned) = canned else {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "no route"}))).into_response();
    };
    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }
    let status = StatusCode::from_u16(canned.status).unwrap();
    if canned.body.is_null() {
        return status.into_response();
    }
    (status, Json(canned.body)).into_response()
}

/// App URL of a port with nothing listening.
pub(crate) async fn closed_app_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// A fully wired app against `config`, with in-memory storage.
pub(crate) fn app_with(config: &ClientConfig, location: &str) -> (AdminApp, MemoryStore, Arc<MemoryNavigator>) {
    let kv = MemoryStore::new();
    let nav = Arc::new(MemoryNavigator::new(location));
    let app = AdminApp::new(config, Arc::new(kv.clone()), nav.clone()).unwrap();
    (app, kv, nav)
}
