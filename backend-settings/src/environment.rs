//! Deployment environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the backend is running. Controls the scheme of `server_host`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Environment::Local)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    // Exact match only: "Production" is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "expected one of 'local', 'staging', 'production', got '{}'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_values() {
        assert_eq!("local".parse::<Environment>(), Ok(Environment::Local));
        assert_eq!("staging".parse::<Environment>(), Ok(Environment::Staging));
        assert_eq!(
            "production".parse::<Environment>(),
            Ok(Environment::Production)
        );
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("Production".parse::<Environment>().is_err());
        assert!("".parse::<Environment>().is_err());
    }

    #[test]
    fn test_default_is_local() {
        assert_eq!(Environment::default(), Environment::Local);
        assert!(Environment::default().is_local());
    }
}
