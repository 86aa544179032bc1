//! Wire types shared by the session pipeline and the admin screens.
//!
//! DESIGN
//! ======
//! The backend is not uniform about response shapes: ids arrive as `_id` or
//! `id`, and login replies put the token and the user record under either of
//! two keys. Parsing is done once here so callers see a single shape.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

const TOKEN_KEYS: [&str; 2] = ["token", "accessToken"];
const USER_KEYS: [&str; 2] = ["user", "data"];

/// A platform user as returned by `/auth/me`, login, and `/admin/users`.
///
/// Fields the client does not model are preserved in `extra` so a record
/// written to storage reads back unchanged. When a record carries both `_id`
/// and `id`, `_id` wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "UserRecord")]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "isVerified", skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Incoming user shape with both id spellings kept apart.
#[derive(Deserialize)]
struct UserRecord {
    #[serde(default, rename = "_id", deserialize_with = "deserialize_opt_string_lenient")]
    object_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_string_lenient")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    mobile: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, rename = "isVerified")]
    is_verified: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.object_id.or(record.id),
            name: record.name,
            email: record.email,
            mobile: record.mobile,
            role: record.role,
            is_verified: record.is_verified,
            extra: record.extra,
        }
    }
}

impl User {
    /// Placeholder identity for a login reply that carried no user record.
    #[must_use]
    pub fn from_email(email: &str) -> Self {
        Self { email: Some(email.to_owned()), ..Self::default() }
    }

    /// Best human-readable label: name, then email, then id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("unknown user")
    }
}

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A login reply reduced to the fields the session needs.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedLogin {
    pub token: String,
    /// `None` when neither `user` nor `data` held an object.
    pub identity: Option<User>,
}

/// A 2xx login reply that carried no usable token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("token missing in login response")]
pub struct MissingToken;

/// Extract the bearer token and user record from a login reply.
///
/// # Errors
///
/// Returns [`MissingToken`] if neither `token` nor `accessToken` is a
/// non-empty string.
pub fn parse_login_response(body: &Value) -> Result<ParsedLogin, MissingToken> {
    let token = TOKEN_KEYS
        .iter()
        .find_map(|key| non_empty_str(body.get(*key)))
        .ok_or(MissingToken)?
        .to_owned();

    let identity = USER_KEYS
        .iter()
        .filter_map(|key| body.get(*key))
        .find(|value| value.is_object())
        .and_then(|value| serde_json::from_value::<User>(value.clone()).ok());

    Ok(ParsedLogin { token, identity })
}

/// The human-readable `message` of a JSON error body, if any.
#[must_use]
pub fn error_message(body: &Value) -> Option<String> {
    non_empty_str(body.get("message")).map(str::to_owned)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

pub(crate) fn deserialize_opt_string_lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}
