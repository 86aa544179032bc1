use std::time::Duration;

use serde_json::{Value, json};

use super::*;
use crate::app::AdminApp;
use crate::config::ClientConfig;
use crate::routes::{MemoryNavigator, Navigator};
use crate::state::storage::{KeyValueStore, MemoryStore, TOKEN_KEY, USER_KEY};
use crate::test_support::{MockBackend, app_with, closed_app_url};

fn persist(kv: &MemoryStore, token: &str, user: &str) {
    kv.set(TOKEN_KEY, token).unwrap();
    kv.set(USER_KEY, user).unwrap();
}

fn stored_user(kv: &MemoryStore) -> Option<serde_json::Value> {
    kv.get(USER_KEY)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

async fn restored(config: &ClientConfig, token: &str, user: &str) -> (AdminApp, MemoryStore, Arc<MemoryNavigator>) {
    let (app, kv, nav) = app_with(config, "/users");
    persist(&kv, token, user);
    app.boot().await;
    (app, kv, nav)
}

// =============================================================================
// restore
// =============================================================================

#[tokio::test]
async fn restore_without_persisted_token_is_anonymous_offline() {
    let backend = MockBackend::start().await;
    let (app, _, _) = app_with(&backend.config(), "/users");

    assert_eq!(app.boot().await, SessionStatus::Anonymous);
    assert!(backend.hits().is_empty());
    assert!(app.session_store().session().token.is_none());
}

#[tokio::test]
async fn restore_refreshes_identity_from_server() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 200, json!({"_id": "1", "role": "user", "email": "a@x.com"}));
    let (app, kv, _) = restored(&backend.config(), "abc", r#"{"email":"a@x.com","role":"admin"}"#).await;

    let session = app.session_store().session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.token.as_deref(), Some("abc"));
    assert_eq!(session.identity.unwrap().role.as_deref(), Some("user"));
    assert_eq!(stored_user(&kv).unwrap()["role"], "user");
    assert_eq!(kv.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));

    let hit = backend.last_hit("GET", "/auth/me").unwrap();
    assert_eq!(hit.authorization.as_deref(), Some("Bearer abc"));
}

#[tokio::test]
async fn restore_with_rejected_token_clears_everything() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 401, json!({"message": "jwt expired"}));
    let (app, kv, nav) = restored(&backend.config(), "expired", r#"{"email":"a@x.com"}"#).await;

    let session = app.session_store().session();
    assert_eq!(session.status, SessionStatus::Anonymous);
    assert!(session.token.is_none());
    assert!(session.identity.is_none());
    assert!(kv.is_empty());
    assert_eq!(nav.current(), "/login");
}

#[tokio::test]
async fn restore_keeps_session_on_server_error() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 503, json!({"message": "maintenance"}));
    let (app, kv, nav) = restored(&backend.config(), "abc", r#"{"email":"a@x.com","role":"admin"}"#).await;

    let session = app.session_store().session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.token.as_deref(), Some("abc"));
    assert_eq!(session.identity.unwrap().role.as_deref(), Some("admin"));
    assert_eq!(kv.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
    assert_eq!(nav.current(), "/users");
}

#[tokio::test]
async fn restore_keeps_session_when_backend_unreachable() {
    let config = ClientConfig::new(closed_app_url().await).unwrap();
    let (app, kv, _) = restored(&config, "abc", r#"{"email":"a@x.com"}"#).await;

    assert_eq!(app.session_store().status(), SessionStatus::Authenticated);
    assert_eq!(kv.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
}

#[tokio::test]
async fn corrupt_identity_with_transient_failure_falls_back_to_anonymous() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 500, json!({}));
    let (app, kv, _) = restored(&backend.config(), "abc", "{not json").await;

    assert_eq!(app.session_store().status(), SessionStatus::Anonymous);
    assert!(kv.is_empty());
}

#[tokio::test]
async fn corrupt_identity_recovers_through_refresh() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 200, json!({"_id": 7, "email": "a@x.com"}));
    let (app, kv, _) = restored(&backend.config(), "abc", "{not json").await;

    let session = app.session_store().session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.identity.unwrap().id.as_deref(), Some("7"));
    assert_eq!(stored_user(&kv).unwrap()["email"], "a@x.com");
}

#[tokio::test]
async fn refresh_accepts_record_with_both_id_keys() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 200, json!({"_id": "65f0", "id": "65f0", "email": "a@x.com"}));
    let (app, _, _) = restored(&backend.config(), "abc", r#"{"email":"a@x.com"}"#).await;

    let session = app.session_store().session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.identity.unwrap().id.as_deref(), Some("65f0"));
}

#[tokio::test]
async fn session_stays_restoring_until_refresh_settles() {
    let backend = MockBackend::start().await;
    backend.respond_after("GET", "/auth/me", Duration::from_millis(150), 200, json!({"email": "a@x.com"}));
    let (app, kv, _) = app_with(&backend.config(), "/users");
    persist(&kv, "abc", r#"{"email":"a@x.com"}"#);

    let booting = app.clone();
    let pending = tokio::spawn(async move { booting.boot().await });
    tokio::time::sleep(Duration::from_millis(40)).await;

    let midway = app.session_store().session();
    assert_eq!(midway.status, SessionStatus::Restoring);
    assert_eq!(midway.token.as_deref(), Some("abc"));
    assert_eq!(app.guard().check("/users"), crate::routes::guard::GuardDecision::Loading);

    assert_eq!(app.session_store().wait_ready().await, SessionStatus::Authenticated);
    assert_eq!(pending.await.unwrap(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn restore_runs_once() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 200, json!({"email": "a@x.com"}));
    let (app, _, _) = restored(&backend.config(), "abc", r#"{"email":"a@x.com"}"#).await;

    assert_eq!(app.boot().await, SessionStatus::Authenticated);
    assert_eq!(backend.hit_count("GET", "/auth/me"), 1);
}

#[tokio::test]
async fn logout_during_refresh_wins() {
    let backend = MockBackend::start().await;
    backend.respond_after("GET", "/auth/me", Duration::from_millis(150), 200, json!({"email": "a@x.com"}));
    backend.respond("POST", "/auth/logout", 200, json!({}));
    let (app, kv, _) = app_with(&backend.config(), "/users");
    persist(&kv, "abc", r#"{"email":"a@x.com"}"#);

    let booting = app.clone();
    let pending = tokio::spawn(async move { booting.boot().await });
    tokio::time::sleep(Duration::from_millis(40)).await;
    app.session_store().logout().await;

    assert_eq!(pending.await.unwrap(), SessionStatus::Anonymous);
    assert_eq!(app.session_store().status(), SessionStatus::Anonymous);
    assert!(kv.is_empty());
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_persists_and_installs_token() {
    let backend = MockBackend::start().await;
    backend.respond(
        "POST",
        "/auth/login",
        200,
        json!({"token": "t1", "user": {"_id": "u1", "email": "a@x.com", "role": "admin"}}),
    );
    backend.respond("GET", "/auth/me", 200, json!({"_id": "u1"}));
    let (app, kv, _) = app_with(&backend.config(), "/login");

    let user = app.session_store().login(&LoginRequest::new("a@x.com", "pw")).await.unwrap();

    assert_eq!(user.role.as_deref(), Some("admin"));
    assert_eq!(kv.get(TOKEN_KEY).unwrap().as_deref(), Some("t1"));
    assert_eq!(stored_user(&kv).unwrap()["role"], "admin");
    let session = app.session_store().session();
    assert!(session.is_authenticated());
    assert_eq!(session.token.as_deref(), Some("t1"));
    assert_eq!(backend.last_hit("POST", "/auth/login").unwrap().body, json!({"email": "a@x.com", "password": "pw"}));

    app.api().get_json::<User>("/auth/me").await.unwrap();
    assert_eq!(backend.last_hit("GET", "/auth/me").unwrap().authorization.as_deref(), Some("Bearer t1"));
}

#[tokio::test]
async fn login_accepts_alternate_reply_shape() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 200, json!({"accessToken": "t2", "data": {"email": "b@x.com"}}));
    let (app, kv, _) = app_with(&backend.config(), "/login");

    let user = app.session_store().login(&LoginRequest::new("b@x.com", "pw")).await.unwrap();

    assert_eq!(user.email.as_deref(), Some("b@x.com"));
    assert_eq!(kv.get(TOKEN_KEY).unwrap().as_deref(), Some("t2"));
}

#[tokio::test]
async fn login_without_user_record_uses_email() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 200, json!({"token": "t3"}));
    let (app, _, _) = app_with(&backend.config(), "/login");

    let user = app.session_store().login(&LoginRequest::new("c@x.com", "pw")).await.unwrap();
    assert_eq!(user.email.as_deref(), Some("c@x.com"));
    assert!(app.session_store().session().is_authenticated());
}

#[tokio::test]
async fn login_without_token_fails() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 200, json!({"user": {"email": "a@x.com"}}));
    let (app, kv, _) = app_with(&backend.config(), "/login");

    let err = app.session_store().login(&LoginRequest::new("a@x.com", "pw")).await.unwrap_err();

    assert!(matches!(err, LoginError::MissingToken(_)));
    assert_eq!(err.message(), "Login failed");
    assert!(kv.is_empty());
    assert_eq!(app.session_store().status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn rejected_login_reports_server_message() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 401, json!({"message": "Invalid credentials"}));
    let (app, kv, nav) = app_with(&backend.config(), "/login");

    let err = app.session_store().login(&LoginRequest::new("a@x.com", "wrong")).await.unwrap_err();

    assert_eq!(err.message(), "Invalid credentials");
    assert!(kv.get(TOKEN_KEY).unwrap().is_none());
    assert!(app.session_store().session().token.is_none());
    assert_eq!(nav.history().len(), 1, "already on the login view");
}

#[tokio::test]
async fn login_failure_without_message_is_generic() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 500, Value::Null);
    let (app, _, _) = app_with(&backend.config(), "/login");

    let err = app.session_store().login(&LoginRequest::new("a@x.com", "pw")).await.unwrap_err();
    assert_eq!(err.message(), "Login failed");
}

#[tokio::test]
async fn failed_login_clears_previous_session() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 200, json!({"email": "a@x.com"}));
    backend.respond("POST", "/auth/login", 400, json!({"message": "Bad request"}));
    let (app, kv, _) = restored(&backend.config(), "abc", r#"{"email":"a@x.com"}"#).await;
    assert!(app.session_store().session().is_authenticated());

    app.session_store().login(&LoginRequest::new("b@x.com", "pw")).await.unwrap_err();

    assert_eq!(app.session_store().status(), SessionStatus::Anonymous);
    assert!(kv.is_empty());
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_notifies_backend_with_bearer() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/me", 200, json!({"email": "a@x.com"}));
    backend.respond("POST", "/auth/logout", 200, json!({"success": true}));
    let (app, kv, _) = restored(&backend.config(), "abc", r#"{"email":"a@x.com"}"#).await;

    app.session_store().logout().await;

    let hit = backend.last_hit("POST", "/auth/logout").unwrap();
    assert_eq!(hit.authorization.as_deref(), Some("Bearer abc"));
    assert!(kv.is_empty());
    assert_eq!(app.session_store().status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn logout_is_idempotent_when_backend_unreachable() {
    let config = ClientConfig::new(closed_app_url().await).unwrap();
    let (app, kv, _) = restored(&config, "abc", r#"{"email":"a@x.com"}"#).await;

    app.session_store().logout().await;
    app.session_store().logout().await;

    assert!(kv.is_empty());
    let session = app.session_store().session();
    assert_eq!(session.status, SessionStatus::Anonymous);
    assert!(session.token.is_none());
}

#[tokio::test]
async fn refresh_identity_without_token_is_anonymous() {
    let backend = MockBackend::start().await;
    let (app, _, _) = app_with(&backend.config(), "/");

    assert_eq!(app.session_store().refresh_identity().await, SessionStatus::Anonymous);
    assert!(backend.hits().is_empty());
}
