//! Error types for settings loading.

use std::fmt;

/// What went wrong with a single environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// Required and not set.
    Missing,
    /// Set, but the value could not be coerced or is not allowed.
    Invalid(String),
}

/// A problem with one named environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn missing(field: &'static str) -> Self {
        Self {
            field,
            kind: FieldErrorKind::Missing,
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            kind: FieldErrorKind::Invalid(reason.into()),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FieldErrorKind::Missing => write!(f, "{} is required", self.field),
            FieldErrorKind::Invalid(reason) => write!(f, "{}: {}", self.field, reason),
        }
    }
}

/// A value had the right presence and type but failed semantic validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Validation error for {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Load-time errors. Any of these aborts process startup.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Configuration error: {}", join_fields(.0))]
    Configuration(Vec<FieldError>),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

impl SettingsError {
    /// Names of the fields reported by a configuration error.
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            SettingsError::Configuration(errors) => errors.iter().map(|e| e.field).collect(),
            SettingsError::Validation(e) => vec![e.field],
            SettingsError::EnvFile(_) => Vec::new(),
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_lists_every_field() {
        let err = SettingsError::Configuration(vec![
            FieldError::missing("JWT_SECRET_KEY"),
            FieldError::invalid("DB_PORT", "invalid digit found in string"),
        ]);

        assert_eq!(
            err.to_string(),
            "Configuration error: JWT_SECRET_KEY is required, DB_PORT: invalid digit found in string"
        );
        assert_eq!(err.fields(), vec!["JWT_SECRET_KEY", "DB_PORT"]);
    }

    #[test]
    fn test_validation_error_display() {
        let err: SettingsError = ValidationError::new("BACKEND_CORS_ORIGINS", "not a list").into();
        assert_eq!(
            err.to_string(),
            "Validation error for BACKEND_CORS_ORIGINS: not a list"
        );
    }
}
