use serde_json::{Value, json};

use super::*;
use crate::resource::ResourceOptions;
use crate::routes::MemoryNavigator;
use crate::state::storage::MemoryStore;
use crate::test_support::MockBackend;

fn app(config: &ClientConfig) -> (AdminApp, Arc<MemoryNavigator>) {
    let nav = Arc::new(MemoryNavigator::new("/"));
    let app = AdminApp::new(config, Arc::new(MemoryStore::new()), nav.clone()).unwrap();
    (app, nav)
}

#[tokio::test]
async fn anonymous_visit_to_protected_route_redirects() {
    let backend = MockBackend::start().await;
    let (app, nav) = app(&backend.config());
    app.boot().await;

    let decision = app.open(Route::Exams).await;

    assert_eq!(decision, GuardDecision::Redirect { to: "/login".to_owned(), from: "/exams".to_owned() });
    assert_eq!(nav.current(), "/login");
    assert_eq!(nav.return_to().as_deref(), Some("/exams"));
}

#[tokio::test]
async fn public_routes_render_for_anyone() {
    let backend = MockBackend::start().await;
    let (app, _) = app(&backend.config());
    app.boot().await;

    for route in [Route::Login, Route::Register, Route::ForgotPassword] {
        assert_eq!(app.open(route).await, GuardDecision::Render);
    }
}

#[tokio::test]
async fn every_layout_route_renders_after_login() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 200, json!({"token": "abc", "user": {"email": "a@x.com"}}));
    let (app, _) = app(&backend.config());
    app.boot().await;
    app.login(&LoginRequest::new("a@x.com", "pw")).await.unwrap();

    for route in Route::ALL.into_iter().filter(|r| r.is_protected()) {
        assert_eq!(app.open(route).await, GuardDecision::Render, "{route:?}");
    }
}

#[tokio::test]
async fn logout_drops_cached_screen_data() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 200, json!({"token": "abc", "user": {"email": "a@x.com"}}));
    backend.respond("GET", "/admin/statistics", 200, json!({"totalUsers": 1}));
    let (app, _) = app(&backend.config());
    app.login(&LoginRequest::new("a@x.com", "pw")).await.unwrap();

    let stats = app.resources().resource::<Value>("/admin/statistics", ResourceOptions::default());
    assert!(stats.load().await.data.is_some());

    app.logout().await;

    assert!(stats.state().data.is_none());
    assert_eq!(app.session_store().status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn components_share_one_credential() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 200, json!({"token": "abc", "user": {"email": "a@x.com"}}));
    backend.respond("GET", "/exams", 200, json!({"exams": []}));
    let (app, _) = app(&backend.config());
    app.login(&LoginRequest::new("a@x.com", "pw")).await.unwrap();

    app.admin().exams().resource().load().await;
    app.account().resend_otp("a@x.com").await.unwrap_err();

    for hit in backend.hits().iter().filter(|hit| hit.path != "/auth/login") {
        assert_eq!(hit.authorization.as_deref(), Some("Bearer abc"), "{}", hit.path);
    }
}
