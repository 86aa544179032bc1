use serde_json::json;

use super::*;
use crate::state::session::SessionStatus;
use crate::test_support::{MockBackend, app_with};

fn registration() -> Registration {
    Registration {
        name: "Asha".to_owned(),
        email: "asha@example.com".to_owned(),
        mobile: "9876543210".to_owned(),
        password: "secret1".to_owned(),
        confirm_password: "secret1".to_owned(),
        role: Role::User,
    }
}

fn invalid_message(result: Result<(), AccountError>) -> String {
    match result {
        Err(AccountError::Invalid(message)) => message.to_owned(),
        other => panic!("expected validation error, got {other:?}"),
    }
}

// =============================================================================
// validation
// =============================================================================

#[test]
fn otp_must_be_six_digits() {
    assert!(validate_otp("123456").is_ok());
    for bad in ["", "12345", "1234567", "12a456", "١٢٣٤٥٦"] {
        assert!(matches!(validate_otp(bad), Err(AccountError::InvalidOtp)), "{bad:?}");
    }
}

#[test]
fn email_shape() {
    assert!(is_valid_email("a.b-c@mail.example.com"));
    assert!(is_valid_email("user_1@x.io"));
    assert!(!is_valid_email("no-at-sign.com"));
    assert!(!is_valid_email("a@b"));
    assert!(!is_valid_email("a@b.c"));
    assert!(!is_valid_email("a@b.info"));
    assert!(!is_valid_email("a..b@x.com"));
    assert!(!is_valid_email("@x.com"));
}

#[test]
fn registration_valid() {
    assert!(registration().validate().is_ok());
}

#[test]
fn registration_rules_in_order() {
    let mut blank = registration();
    blank.name = "  ".to_owned();
    assert_eq!(invalid_message(blank.validate()), "Please fill in all fields");

    let mut short = registration();
    short.password = "abc".to_owned();
    short.confirm_password = "abc".to_owned();
    assert_eq!(invalid_message(short.validate()), "Password must be at least 6 characters long");

    let mut mismatch = registration();
    mismatch.confirm_password = "secret2".to_owned();
    assert_eq!(invalid_message(mismatch.validate()), "Passwords do not match");

    let mut mobile = registration();
    mobile.mobile = "12345".to_owned();
    assert_eq!(invalid_message(mobile.validate()), "Please enter a valid 10-digit mobile number");

    let mut email = registration();
    email.email = "asha".to_owned();
    assert_eq!(invalid_message(email.validate()), "Please enter a valid email address");
}

#[test]
fn registration_debug_redacts_password() {
    let rendered = format!("{:?}", registration());
    assert!(!rendered.contains("secret1"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn registration_body_omits_confirmation() {
    let body = serde_json::to_value(registration()).unwrap();
    assert_eq!(
        body,
        json!({
            "name": "Asha",
            "email": "asha@example.com",
            "mobile": "9876543210",
            "password": "secret1",
            "role": "user",
        })
    );
}

// =============================================================================
// endpoints
// =============================================================================

#[tokio::test]
async fn register_posts_form() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/register", 201, json!({"message": "check your email"}));
    let (app, _, _) = app_with(&backend.config(), "/register");

    let reply = app.account().register(&registration()).await.unwrap();

    assert_eq!(reply.status, 201);
    assert_eq!(reply.message.as_deref(), Some("check your email"));
    let hit = backend.last_hit("POST", "/auth/register").unwrap();
    assert_eq!(hit.body["email"], "asha@example.com");
    assert!(hit.body.get("confirm_password").is_none());
}

#[tokio::test]
async fn invalid_registration_sends_nothing() {
    let backend = MockBackend::start().await;
    let (app, _, _) = app_with(&backend.config(), "/register");
    let mut form = registration();
    form.mobile = "abc".to_owned();

    assert!(app.account().register(&form).await.is_err());
    assert!(backend.hits().is_empty());
}

#[tokio::test]
async fn verify_email_reports_token_without_installing_it() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/verify-email", 200, json!({"success": true, "token": "fresh"}));
    let (app, kv, _) = app_with(&backend.config(), "/register");
    app.boot().await;

    let reply = app.account().verify_email("asha@example.com", "123456").await.unwrap();

    assert_eq!(reply.token.as_deref(), Some("fresh"));
    assert!(reply.success);
    assert!(kv.is_empty());
    assert_eq!(app.session_store().status(), SessionStatus::Anonymous);
    assert!(app.session_store().session().token.is_none());
}

#[tokio::test]
async fn bad_otp_is_rejected_before_sending() {
    let backend = MockBackend::start().await;
    let (app, _, _) = app_with(&backend.config(), "/register");

    let err = app.account().verify_reset_otp("a@x.com", "12").await.unwrap_err();
    assert!(matches!(err, AccountError::InvalidOtp));
    assert!(backend.hits().is_empty());
}

#[tokio::test]
async fn reset_password_flow() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/forgot-password", 200, json!({"success": true}));
    backend.respond("POST", "/auth/verify-reset-otp", 200, json!({"success": true}));
    backend.respond("POST", "/auth/reset-password", 200, json!({"success": true}));
    let (app, _, _) = app_with(&backend.config(), "/forgot-password");
    let account = app.account();

    assert!(account.forgot_password("a@x.com").await.unwrap().success);
    assert!(account.verify_reset_otp("a@x.com", "654321").await.unwrap().success);
    assert!(account.reset_password("a@x.com", "654321", "newpass", "newpass").await.unwrap().success);

    let hit = backend.last_hit("POST", "/auth/reset-password").unwrap();
    assert_eq!(hit.body, json!({"email": "a@x.com", "otp": "654321", "newPassword": "newpass"}));
}

#[tokio::test]
async fn reset_password_mismatch_is_local() {
    let backend = MockBackend::start().await;
    let (app, _, _) = app_with(&backend.config(), "/forgot-password");

    let err = app.account().reset_password("a@x.com", "654321", "newpass", "other1").await.unwrap_err();
    assert_eq!(err.message(), "Passwords do not match");
    assert!(backend.hits().is_empty());
}

#[tokio::test]
async fn forgot_password_requires_email() {
    let backend = MockBackend::start().await;
    let (app, _, _) = app_with(&backend.config(), "/forgot-password");
    let err = app.account().forgot_password(" ").await.unwrap_err();
    assert_eq!(err.message(), "Please enter your email address");
}

#[tokio::test]
async fn server_message_surfaces() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/resend-otp", 429, json!({"message": "Too many requests"}));
    let (app, _, _) = app_with(&backend.config(), "/register");

    let err = app.account().resend_otp("a@x.com").await.unwrap_err();
    assert_eq!(err.message(), "Too many requests");
}
