//! The settings record and its loader.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use url::Url;

use crate::cors::{CORS_FIELD, origins_from_env};
use crate::database::{DatabaseParts, build_database_url, redact_url};
use crate::environment::Environment;
use crate::error::{FieldError, SettingsError, ValidationError};
use crate::source::{EnvFile, EnvSource, Layered, ProcessEnv};

/// Env file read by [`load_settings`], relative to the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

const DEFAULT_DOMAIN: &str = "localhost";
const DEFAULT_JWT_ALGORITHM: &str = "HS256";
const DEFAULT_JWT_EXPIRATION_SECONDS: i64 = 3600;

/// Validated backend configuration.
///
/// Built once at startup and never mutated; every field is read through an
/// accessor. `server_host` and `database_uri` are derived from the stored
/// fields.
#[derive(Clone, PartialEq)]
pub struct Settings {
    domain: String,
    environment: Environment,
    jwt_secret_key: String,
    jwt_algorithm: String,
    jwt_expiration: chrono::Duration,
    cors_origins: Vec<String>,
    db_host: String,
    db_port: u16,
    db_name: String,
    db_user: String,
    db_password: String,
    database_url: Url,
}

/// Loads settings from the process environment, falling back to `./.env`.
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(DEFAULT_ENV_FILE)
}

/// Loads settings from the process environment, falling back to the env
/// file at `path`. Process values always win over file values.
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings, SettingsError> {
    let file = EnvFile::read(path)?;
    Settings::from_source(&Layered::new(ProcessEnv, file))
}

impl Settings {
    /// Validates every field from `source`.
    ///
    /// All missing or malformed fields are reported together. No partially
    /// built record is ever returned.
    pub fn from_source<S: EnvSource + ?Sized>(source: &S) -> Result<Self, SettingsError> {
        let mut errors = Vec::new();
        let mut validation: Option<ValidationError> = None;

        let domain = lookup(source, "DOMAIN", &mut errors)
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        let environment =
            optional::<Environment, _>(source, "ENVIRONMENT", &mut errors).unwrap_or_default();
        let jwt_secret_key = required(source, "JWT_SECRET_KEY", &mut errors);
        let jwt_algorithm = lookup(source, "JWT_ALGORITHM", &mut errors)
            .unwrap_or_else(|| DEFAULT_JWT_ALGORITHM.to_string());
        let jwt_expiration = optional(source, "JWT_EXPIRATION_TIME", &mut errors)
            .unwrap_or(DEFAULT_JWT_EXPIRATION_SECONDS);
        let jwt_expiration = match chrono::Duration::try_seconds(jwt_expiration) {
            Some(duration) => duration,
            None => {
                errors.push(FieldError::invalid(
                    "JWT_EXPIRATION_TIME",
                    format!("{} seconds is out of range", jwt_expiration),
                ));
                chrono::Duration::zero()
            }
        };

        let cors_origins = match lookup(source, CORS_FIELD, &mut errors) {
            None => Vec::new(),
            Some(raw) => match origins_from_env(&raw) {
                Ok(Ok(origins)) => origins,
                Ok(Err(e)) => {
                    validation.get_or_insert(e);
                    Vec::new()
                }
                Err(e) => {
                    errors.push(e);
                    Vec::new()
                }
            },
        };

        let db_host = required(source, "DB_HOST", &mut errors);
        let db_port = parsed_required::<u16, _>(source, "DB_PORT", &mut errors);
        let db_name = required(source, "DB_NAME", &mut errors);
        let db_user = required(source, "DB_USER", &mut errors);
        let db_password = required(source, "DB_PASSWORD", &mut errors);

        let database_url = match (&db_host, db_port, &db_name, &db_user, &db_password) {
            (Some(host), Some(port), Some(name), Some(user), Some(password)) => {
                match build_database_url(&DatabaseParts {
                    host,
                    port,
                    name,
                    user,
                    password,
                }) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                }
            }
            _ => None,
        };

        if !errors.is_empty() {
            return Err(SettingsError::Configuration(errors));
        }
        if let Some(e) = validation {
            return Err(e.into());
        }

        match (
            jwt_secret_key,
            db_host,
            db_port,
            db_name,
            db_user,
            db_password,
            database_url,
        ) {
            (
                Some(jwt_secret_key),
                Some(db_host),
                Some(db_port),
                Some(db_name),
                Some(db_user),
                Some(db_password),
                Some(database_url),
            ) => {
                let settings = Self {
                    domain,
                    environment,
                    jwt_secret_key,
                    jwt_algorithm,
                    jwt_expiration,
                    cors_origins,
                    db_host,
                    db_port,
                    db_name,
                    db_user,
                    db_password,
                    database_url,
                };
                tracing::debug!(
                    environment = %settings.environment,
                    server_host = %settings.server_host(),
                    cors_origins = settings.cors_origins.len(),
                    "Settings loaded"
                );
                Ok(settings)
            }
            // Every None above pushed an error, so this arm is never taken
            // with an empty list.
            _ => Err(SettingsError::Configuration(errors)),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn jwt_secret_key(&self) -> &str {
        &self.jwt_secret_key
    }

    pub fn jwt_algorithm(&self) -> &str {
        &self.jwt_algorithm
    }

    pub fn jwt_expiration_seconds(&self) -> i64 {
        self.jwt_expiration.num_seconds()
    }

    /// Token lifetime as a duration.
    pub fn jwt_expiration(&self) -> chrono::Duration {
        self.jwt_expiration
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn db_host(&self) -> &str {
        &self.db_host
    }

    pub fn db_port(&self) -> u16 {
        self.db_port
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn db_user(&self) -> &str {
        &self.db_user
    }

    pub fn db_password(&self) -> &str {
        &self.db_password
    }

    /// Public base URL: plain HTTP locally, HTTPS everywhere else.
    pub fn server_host(&self) -> String {
        if self.environment.is_local() {
            format!("http://{}", self.domain)
        } else {
            format!("https://{}", self.domain)
        }
    }

    /// The five database fields as URI parts.
    pub fn database_parts(&self) -> DatabaseParts<'_> {
        DatabaseParts {
            host: &self.db_host,
            port: self.db_port,
            name: &self.db_name,
            user: &self.db_user,
            password: &self.db_password,
        }
    }

    /// MySQL connection URI.
    pub fn database_url(&self) -> &Url {
        &self.database_url
    }

    pub fn database_uri(&self) -> String {
        self.database_url.to_string()
    }

    /// Everything except secrets, plus derived fields, as JSON.
    pub fn public_view(&self) -> serde_json::Value {
        serde_json::json!({
            "domain": self.domain,
            "environment": self.environment,
            "server_host": self.server_host(),
            "jwt_algorithm": self.jwt_algorithm,
            "jwt_expiration_seconds": self.jwt_expiration_seconds(),
            "cors_origins": self.cors_origins,
            "db_host": self.db_host,
            "db_port": self.db_port,
            "db_name": self.db_name,
            "db_user": self.db_user,
            "database_uri": redact_url(&self.database_url),
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("domain", &self.domain)
            .field("environment", &self.environment)
            .field("jwt_secret_key", &"[redacted]")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_seconds", &self.jwt_expiration_seconds())
            .field("cors_origins", &self.cors_origins)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"[redacted]")
            .finish()
    }
}

/// Reads `field`, recording an unreadable value as an error.
fn lookup<S: EnvSource + ?Sized>(
    source: &S,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    source.get(field).unwrap_or_else(|e| {
        errors.push(e);
        None
    })
}

fn required<S: EnvSource + ?Sized>(
    source: &S,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match source.get(field) {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            errors.push(FieldError::missing(field));
            None
        }
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn parsed_required<T, S>(source: &S, field: &'static str, errors: &mut Vec<FieldError>) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    S: EnvSource + ?Sized,
{
    required(source, field, errors).and_then(|raw| parse_field(field, &raw, errors))
}

fn optional<T, S>(source: &S, field: &'static str, errors: &mut Vec<FieldError>) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    S: EnvSource + ?Sized,
{
    lookup(source, field, errors).and_then(|raw| parse_field(field, &raw, errors))
}

fn parse_field<T>(field: &'static str, raw: &str, errors: &mut Vec<FieldError>) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(FieldError::invalid(field, format!("'{}': {}", raw, e)));
            None
        }
    }
}
