//! Sources of raw setting values.
//!
//! Lookups are case-sensitive. Reading an env file never touches the process
//! environment, so loading settings twice yields the same record.

use std::collections::HashMap;
use std::env::VarError;
use std::path::Path;

use crate::error::{FieldError, SettingsError};

/// A case-sensitive key/value lookup.
///
/// `Ok(None)` means the key is absent. A value that is present but cannot be
/// read as text is an error for that field.
pub trait EnvSource {
    fn get(&self, key: &'static str) -> Result<Option<String>, FieldError>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &'static str) -> Result<Option<String>, FieldError> {
        match std::env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(raw)) => Err(FieldError::invalid(
                key,
                format!("{:?} is not valid UTF-8", raw),
            )),
        }
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &'static str) -> Result<Option<String>, FieldError> {
        Ok(HashMap::get(self, key).cloned())
    }
}

impl<S: EnvSource + ?Sized> EnvSource for &S {
    fn get(&self, key: &'static str) -> Result<Option<String>, FieldError> {
        (**self).get(key)
    }
}

/// Values parsed from a dotenv-style file.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    vars: HashMap<String, String>,
}

impl EnvFile {
    /// Reads `path`. A missing file yields an empty source.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                tracing::debug!(path = %path.display(), "No env file found");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) = item?;
            vars.insert(key, value);
        }

        tracing::debug!(path = %path.display(), count = vars.len(), "Loaded env file");
        Ok(Self { vars })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvSource for EnvFile {
    fn get(&self, key: &'static str) -> Result<Option<String>, FieldError> {
        Ok(self.vars.get(key).cloned())
    }
}

/// Two sources where `primary` wins and `fallback` fills the gaps.
#[derive(Debug, Clone)]
pub struct Layered<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> Layered<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: EnvSource, F: EnvSource> EnvSource for Layered<P, F> {
    fn get(&self, key: &'static str) -> Result<Option<String>, FieldError> {
        match self.primary.get(key)? {
            Some(value) => Ok(Some(value)),
            None => self.fallback.get(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = EnvFile::read(dir.path().join(".env")).unwrap();
        assert!(file.is_empty());
    }

    #[test]
    fn test_env_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "DB_HOST=db.internal").unwrap();
        writeln!(file, "DB_PASSWORD=\"quoted value\"").unwrap();

        let env = EnvFile::read(file.path()).unwrap();

        assert_eq!(env.len(), 2);
        assert_eq!(env.get("DB_HOST").unwrap().as_deref(), Some("db.internal"));
        assert_eq!(env.get("DB_PASSWORD").unwrap().as_deref(), Some("quoted value"));
    }

    #[test]
    fn test_malformed_env_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DB_HOST=db.internal").unwrap();
        writeln!(file, "DB_PASSWORD=\"unterminated").unwrap();

        let err = EnvFile::read(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::EnvFile(_)), "{err:?}");
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let source = map(&[("DOMAIN", "example.com")]);
        assert_eq!(
            EnvSource::get(&source, "DOMAIN").unwrap().as_deref(),
            Some("example.com")
        );
        assert_eq!(EnvSource::get(&source, "domain").unwrap(), None);
    }

    #[test]
    fn test_primary_wins_over_fallback() {
        let layered = Layered::new(
            map(&[("DB_HOST", "from-process")]),
            map(&[("DB_HOST", "from-file"), ("DB_NAME", "app")]),
        );

        assert_eq!(layered.get("DB_HOST").unwrap().as_deref(), Some("from-process"));
        assert_eq!(layered.get("DB_NAME").unwrap().as_deref(), Some("app"));
        assert_eq!(layered.get("DB_USER").unwrap(), None);
    }

    #[test]
    fn test_unreadable_primary_is_not_masked_by_fallback() {
        struct Unreadable;

        impl EnvSource for Unreadable {
            fn get(&self, key: &'static str) -> Result<Option<String>, FieldError> {
                Err(FieldError::invalid(key, "not valid UTF-8"))
            }
        }

        let layered = Layered::new(Unreadable, map(&[("DOMAIN", "file.example.com")]));
        let err = layered.get("DOMAIN").unwrap_err();
        assert_eq!(err.field, "DOMAIN");
    }

    #[test]
    fn test_missing_process_variable_is_absent() {
        assert_eq!(ProcessEnv.get("BACKEND_SETTINGS_TEST_UNSET_VARIABLE").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_process_variable_is_invalid() {
        use crate::error::FieldErrorKind;
        use std::os::unix::ffi::OsStrExt;

        const KEY: &str = "BACKEND_SETTINGS_TEST_NON_UTF8";
        let value = std::ffi::OsStr::from_bytes(b"bad\xff.example");
        // SAFETY: the key is unique to this test and no other code reads it.
        unsafe { std::env::set_var(KEY, value) };

        let err = ProcessEnv.get(KEY).unwrap_err();

        unsafe { std::env::remove_var(KEY) };
        assert_eq!(err.field, KEY);
        assert!(matches!(err.kind, FieldErrorKind::Invalid(_)));
    }
}
