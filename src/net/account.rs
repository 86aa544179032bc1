//! Public account flows: registration, email verification, password reset.
//!
//! These endpoints run before anyone is logged in. They go through the same
//! [`ApiClient`] as everything else, so a stray `401` still reaches the
//! interceptor, but nothing here touches the session. A token returned by
//! `verify-email` is handed back to the caller and never installed; the user
//! logs in normally afterwards.

#[cfg(test)]
#[path = "account_test.rs"]
mod account_test;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::api::{ApiClient, ApiError, ApiResponse};

pub const REGISTER_ENDPOINT: &str = "/auth/register";
pub const VERIFY_EMAIL_ENDPOINT: &str = "/auth/verify-email";
pub const RESEND_OTP_ENDPOINT: &str = "/auth/resend-otp";
pub const FORGOT_PASSWORD_ENDPOINT: &str = "/auth/forgot-password";
pub const VERIFY_RESET_OTP_ENDPOINT: &str = "/auth/verify-reset-otp";
pub const RESET_PASSWORD_ENDPOINT: &str = "/auth/reset-password";

const OTP_LEN: usize = 6;
const MIN_PASSWORD_LEN: usize = 6;
const MOBILE_LEN: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Please enter a valid 6-digit OTP")]
    InvalidOtp,
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AccountError {
    /// Message for the form: validation text, the server's `message`, or the
    /// transport error.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            AccountError::Api(e) => e.server_message().map_or_else(|| e.to_string(), str::to_owned),
            other => other.to_string(),
        }
    }
}

/// Exactly six ASCII digits.
///
/// # Errors
///
/// Returns [`AccountError::InvalidOtp`] otherwise.
pub fn validate_otp(otp: &str) -> Result<(), AccountError> {
    if otp.len() == OTP_LEN && otp.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AccountError::InvalidOtp)
    }
}

fn validate_new_password(password: &str, confirm: &str) -> Result<(), AccountError> {
    if password.is_empty() || confirm.is_empty() {
        return Err(AccountError::Invalid("Please fill in all fields"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::Invalid("Password must be at least 6 characters long"));
    }
    if password != confirm {
        return Err(AccountError::Invalid("Passwords do not match"));
    }
    Ok(())
}

fn is_word_run(part: &str) -> bool {
    !part.is_empty()
        && part.split(['.', '-']).all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// `local@domain.tld`, where the final label is two or three word characters.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    is_word_run(local)
        && is_word_run(host)
        && (2..=3).contains(&tld.chars().count())
        && tld.chars().all(|c| c.is_alphanumeric() || c == '_')
}

// =============================================================================
// REGISTRATION
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Sign-up form. `confirm_password` is checked locally and never sent.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
    pub role: Role,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("mobile", &self.mobile)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Registration {
    /// Form checks, in the order the form reports them.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Invalid`] with the first failing rule.
    pub fn validate(&self) -> Result<(), AccountError> {
        let required = [&self.name, &self.email, &self.mobile, &self.password, &self.confirm_password];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(AccountError::Invalid("Please fill in all fields"));
        }
        validate_new_password(&self.password, &self.confirm_password)?;
        if self.mobile.len() != MOBILE_LEN || !self.mobile.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AccountError::Invalid("Please enter a valid 10-digit mobile number"));
        }
        if !is_valid_email(&self.email) {
            return Err(AccountError::Invalid("Please enter a valid email address"));
        }
        Ok(())
    }
}

/// Reply shape shared by the account endpoints. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountReply {
    pub status: u16,
    pub success: bool,
    pub message: Option<String>,
    pub token: Option<String>,
}

impl AccountReply {
    fn from_response(response: &ApiResponse) -> Self {
        let body = &response.body;
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            status: response.status,
            success: body.get("success").and_then(Value::as_bool).unwrap_or(false),
            message: text("message"),
            token: text("token").filter(|t| !t.is_empty()),
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct AccountApi {
    api: ApiClient,
}

impl AccountApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<AccountReply, AccountError> {
        let response = self.api.post_json(path, body).await?;
        Ok(AccountReply::from_response(&response))
    }

    /// # Errors
    ///
    /// Validation failures are reported without a request.
    pub async fn register(&self, registration: &Registration) -> Result<AccountReply, AccountError> {
        registration.validate()?;
        let response = self.api.post_json(REGISTER_ENDPOINT, registration).await?;
        info!(email = %registration.email, "registration submitted");
        Ok(AccountReply::from_response(&response))
    }

    /// # Errors
    ///
    /// [`AccountError::InvalidOtp`] before sending, otherwise API failures.
    pub async fn verify_email(&self, email: &str, otp: &str) -> Result<AccountReply, AccountError> {
        validate_otp(otp)?;
        self.post(VERIFY_EMAIL_ENDPOINT, &json!({ "email": email, "otp": otp })).await
    }

    /// # Errors
    ///
    /// API failures.
    pub async fn resend_otp(&self, email: &str) -> Result<AccountReply, AccountError> {
        self.post(RESEND_OTP_ENDPOINT, &json!({ "email": email })).await
    }

    /// # Errors
    ///
    /// [`AccountError::Invalid`] for an empty email, otherwise API failures.
    pub async fn forgot_password(&self, email: &str) -> Result<AccountReply, AccountError> {
        if email.trim().is_empty() {
            return Err(AccountError::Invalid("Please enter your email address"));
        }
        self.post(FORGOT_PASSWORD_ENDPOINT, &json!({ "email": email })).await
    }

    /// # Errors
    ///
    /// [`AccountError::InvalidOtp`] before sending, otherwise API failures.
    pub async fn verify_reset_otp(&self, email: &str, otp: &str) -> Result<AccountReply, AccountError> {
        validate_otp(otp)?;
        self.post(VERIFY_RESET_OTP_ENDPOINT, &json!({ "email": email, "otp": otp })).await
    }

    /// # Errors
    ///
    /// OTP and password rules are checked before sending.
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
        confirm: &str,
    ) -> Result<AccountReply, AccountError> {
        validate_otp(otp)?;
        validate_new_password(new_password, confirm)?;
        let body = json!({ "email": email, "otp": otp, "newPassword": new_password });
        let reply = self.post(RESET_PASSWORD_ENDPOINT, &body).await?;
        info!(%email, "password reset");
        Ok(reply)
    }
}
