//! Command-line interface.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use backend_db::EngineOptions;
use backend_settings::EnvSource;
use clap::{Parser, Subcommand, ValueEnum};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Pool and log flags come from the command line or the process environment.
/// When neither sets one, the env file named by `--env-file` is consulted,
/// then the built-in default.
#[derive(Parser, Debug)]
#[command(name = "backend")]
#[command(author, version, about = "Backend settings and database tooling", long_about = None)]
pub struct Cli {
    /// Env file consulted for values missing from the process environment
    #[arg(long, env = "ENV_FILE", default_value = ".env")]
    pub env_file: PathBuf,

    /// Maximum number of pooled database connections [default: 5]
    #[arg(long, env = "DB_POOL_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Seconds to wait for a pooled connection before giving up [default: 30]
    #[arg(long, env = "DB_POOL_ACQUIRE_TIMEOUT_SECS")]
    pub acquire_timeout_secs: Option<u64>,

    /// Log output format [default: text]
    #[arg(long, env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Print the resolved configuration (secrets masked) as JSON
    Config,
    /// Open a session, run `SELECT 1` and close it
    CheckDb,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogFormat as ValueEnum>::from_str(s, true)
    }
}

impl Cli {
    /// Pool limits, falling back to `file` for flags left unset.
    pub fn engine_options<S: EnvSource>(&self, file: &S) -> anyhow::Result<EngineOptions> {
        let max_connections = resolve(
            self.max_connections,
            file,
            "DB_POOL_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let acquire_timeout_secs = resolve(
            self.acquire_timeout_secs,
            file,
            "DB_POOL_ACQUIRE_TIMEOUT_SECS",
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;

        Ok(EngineOptions {
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }

    /// Log format, falling back to `file` when the flag is unset.
    pub fn log_format<S: EnvSource>(&self, file: &S) -> anyhow::Result<LogFormat> {
        resolve(self.log_format, file, "LOG_FORMAT", LogFormat::Text)
    }
}

fn resolve<T, S>(flag: Option<T>, file: &S, key: &'static str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    S: EnvSource,
{
    if let Some(value) = flag {
        return Ok(value);
    }
    match file.get(key).map_err(|e| anyhow!("{}", e))? {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{}: '{}': {}", key, raw, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn file(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["backend", "config"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Config));

        let cli = Cli::try_parse_from(["backend", "check-db"]).unwrap();
        assert_eq!(cli.command, Some(Commands::CheckDb));

        let cli = Cli::try_parse_from(["backend"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_engine_options_from_flags() {
        let cli = Cli::try_parse_from([
            "backend",
            "--max-connections",
            "12",
            "--acquire-timeout-secs",
            "3",
            "--log-format",
            "json",
        ])
        .unwrap();
        let env_file = file(&[
            ("DB_POOL_MAX_CONNECTIONS", "40"),
            ("DB_POOL_ACQUIRE_TIMEOUT_SECS", "90"),
            ("LOG_FORMAT", "text"),
        ]);

        assert_eq!(
            cli.engine_options(&env_file).unwrap(),
            EngineOptions {
                max_connections: 12,
                acquire_timeout: Duration::from_secs(3),
            }
        );
        assert_eq!(cli.log_format(&env_file).unwrap(), LogFormat::Json);
    }

    #[test]
    fn test_unset_flags_fall_back_to_env_file() {
        let cli = Cli {
            env_file: PathBuf::from("prod.env"),
            max_connections: None,
            acquire_timeout_secs: None,
            log_format: None,
            command: None,
        };
        let env_file = file(&[
            ("DB_POOL_MAX_CONNECTIONS", " 20 "),
            ("LOG_FORMAT", "JSON"),
        ]);

        assert_eq!(
            cli.engine_options(&env_file).unwrap(),
            EngineOptions {
                max_connections: 20,
                acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            }
        );
        assert_eq!(cli.log_format(&env_file).unwrap(), LogFormat::Json);
        assert_eq!(cli.log_format(&file(&[])).unwrap(), LogFormat::Text);
        assert_eq!(cli.engine_options(&file(&[])).unwrap(), EngineOptions::default());
    }

    #[test]
    fn test_malformed_env_file_flag_is_an_error() {
        let cli = Cli {
            env_file: PathBuf::from(".env"),
            max_connections: None,
            acquire_timeout_secs: None,
            log_format: None,
            command: None,
        };

        let err = cli
            .engine_options(&file(&[("DB_POOL_MAX_CONNECTIONS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("DB_POOL_MAX_CONNECTIONS"), "{err}");
        assert!(cli.log_format(&file(&[("LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["backend", "--log-format", "xml"]).is_err());
    }
}
