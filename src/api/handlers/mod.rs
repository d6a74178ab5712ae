//! API handlers and shared request helpers for reparto.
//!
//! The helpers here normalize emails, check field lengths and parse the
//! loosely-typed `user_id` values accepted by the membership endpoints.

pub mod auth;
pub mod error;
pub mod groups;
pub mod health;
pub mod users;

use axum::{body::Bytes, Json};
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use error::{ApiError, FieldErrors, MSG_BLANK, MSG_NULL, MSG_REQUIRED};

/// Lightweight email sanity check applied after normalization.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Emails are stored and compared trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Required, non-blank text field, trimmed. Records the problem and returns `None` when unusable.
pub(crate) fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&Option<String>>,
) -> Option<String> {
    required_raw(errors, field, value).map(|text| text.trim().to_string())
}

/// Like [`required_text`] but keeps surrounding whitespace, for passwords.
pub(crate) fn required_raw(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&Option<String>>,
) -> Option<String> {
    match value {
        None => {
            errors.add(field, MSG_REQUIRED);
            None
        }
        Some(None) => {
            errors.add(field, MSG_NULL);
            None
        }
        Some(Some(text)) if text.trim().is_empty() => {
            errors.add(field, MSG_BLANK);
            None
        }
        Some(Some(text)) => Some(text.clone()),
    }
}

/// Optional text field, trimmed. Blank values read as `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Deserialize a request body that was read before authentication ran.
///
/// An empty body reads as `{}`.
pub(crate) fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    let Json(value) = Json::<T>::from_bytes(raw)?;
    Ok(value)
}

pub(crate) fn check_max_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
    }
}

/// Truthiness of a JSON value the way loosely-typed clients expect it.
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(true) => false,
    }
}

/// Parse the `user_id` accepted by the membership endpoints.
///
/// Integers and integer strings are accepted. Falsy values (absent, `null`,
/// `false`, `0`, `""`, `[]`, `{}`) count as missing.
pub(crate) fn parse_user_id(value: Option<&Value>) -> Result<i64, ApiError> {
    const NOT_INTEGER: ApiError = ApiError::BadRequest("user_id must be a valid integer");

    let Some(value) = value.filter(|value| !is_falsy(value)) else {
        return Err(ApiError::BadRequest("user_id is required"));
    };
    match value {
        Value::Number(number) => number.as_i64().ok_or(NOT_INTEGER),
        Value::String(text) => text.trim().parse::<i64>().map_err(|_| NOT_INTEGER),
        _ => Err(NOT_INTEGER),
    }
}

/// Path ids that are not integers cannot name a row.
pub(crate) fn parse_path_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::NotFound)
}
