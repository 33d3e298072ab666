//! # Backend Settings
//!
//! Typed, validated configuration for the backend, loaded from the process
//! environment and an optional `.env` file.
//!
//! ## Layout
//!
//! - `settings` - the `Settings` record, its loader and derived fields
//! - `source` - where raw values come from (process env, env file, maps)
//! - `cors` - normalization of `BACKEND_CORS_ORIGINS`
//! - `database` - MySQL connection URI construction
//! - `environment` - deployment mode
//! - `error` - load-time error types

pub mod cors;
pub mod database;
pub mod environment;
pub mod error;
pub mod settings;
pub mod source;

pub use cors::{CorsValue, parse_cors_origins};
pub use database::{DATABASE_SCHEME, DatabaseParts, build_database_url, redact_url};
pub use environment::Environment;
pub use error::{FieldError, FieldErrorKind, SettingsError, ValidationError};
pub use settings::{DEFAULT_ENV_FILE, Settings, load_settings, load_settings_from};
pub use source::{EnvFile, EnvSource, Layered, ProcessEnv};
