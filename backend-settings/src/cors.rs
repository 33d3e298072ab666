//! Normalization of the `BACKEND_CORS_ORIGINS` setting.
//!
//! The variable may hold a comma-separated string (`http://a.com, http://b.com`)
//! or a JSON list literal (`["http://a.com"]`). The env layer decodes list
//! literals first, so by the time [`parse_cors_origins`] runs a list is
//! already a [`CorsValue::List`].

use url::Url;

use crate::error::{FieldError, ValidationError};

pub(crate) const CORS_FIELD: &str = "BACKEND_CORS_ORIGINS";

/// Raw shape of a CORS setting before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsValue {
    Text(String),
    List(Vec<String>),
    /// Anything else (numbers, objects, mixed arrays).
    Other(serde_json::Value),
}

impl From<serde_json::Value> for CorsValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => CorsValue::Text(text),
            serde_json::Value::Array(items) => {
                let strings: Option<Vec<String>> = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect();
                match strings {
                    Some(list) => CorsValue::List(list),
                    None => CorsValue::Other(serde_json::Value::Array(items)),
                }
            }
            other => CorsValue::Other(other),
        }
    }
}

/// Normalizes a CORS value.
///
/// A string that does not start with `[` is split on commas, each segment is
/// trimmed and empty segments are dropped. Lists and `[`-prefixed strings are
/// returned unchanged. Any other shape is rejected.
pub fn parse_cors_origins(value: CorsValue) -> Result<CorsValue, ValidationError> {
    match value {
        CorsValue::Text(text) if !text.starts_with('[') => Ok(CorsValue::List(
            text.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        value @ (CorsValue::Text(_) | CorsValue::List(_)) => Ok(value),
        CorsValue::Other(other) => Err(ValidationError::new(
            CORS_FIELD,
            format!("expected a string or a list of strings, got {}", other),
        )),
    }
}

/// Decodes a raw environment value the way the env layer does for list-like
/// settings: valid JSON is taken as JSON, anything else stays a plain string.
pub(crate) fn decode_env_value(raw: &str) -> Result<CorsValue, FieldError> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => Ok(CorsValue::from(value)),
        Err(e) if raw.trim_start().starts_with('[') => Err(FieldError::invalid(
            CORS_FIELD,
            format!("invalid list literal: {}", e),
        )),
        Err(_) => Ok(CorsValue::Text(raw.to_string())),
    }
}

/// Runs the full pipeline for an env value and returns the validated origins.
pub(crate) fn origins_from_env(raw: &str) -> Result<Result<Vec<String>, ValidationError>, FieldError> {
    let decoded = decode_env_value(raw)?;
    Ok(parse_cors_origins(decoded).and_then(validate_origins))
}

fn validate_origins(value: CorsValue) -> Result<Vec<String>, ValidationError> {
    let origins = match value {
        CorsValue::List(origins) => origins,
        CorsValue::Text(text) => {
            return Err(ValidationError::new(
                CORS_FIELD,
                format!("'{}' looks like a list literal but is not a list", text),
            ));
        }
        CorsValue::Other(other) => {
            return Err(ValidationError::new(
                CORS_FIELD,
                format!("expected a list of strings, got {}", other),
            ));
        }
    };

    for origin in &origins {
        Url::parse(origin).map_err(|e| {
            ValidationError::new(CORS_FIELD, format!("'{}' is not a valid URL: {}", origin, e))
        })?;
    }

    Ok(origins)
}
