//! # Backend Application
//!
//! Binary that wires together the startup components:
//! - Read the env file chosen with `--env-file`
//! - Initialize tracing
//! - Load settings from the environment, falling back to that file
//! - Build the database engine
//! - Check that a session can be opened

mod cli;
mod health;
mod telemetry;

use clap::Parser;

use backend_db::Engine;
use backend_settings::{EnvFile, Layered, ProcessEnv, Settings};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Only the chosen file is read, and the process environment is never
    // modified, so process values always win over file values.
    let env_file = EnvFile::read(&cli.env_file)?;
    telemetry::init(cli.log_format(&env_file)?);
    tracing::debug!(path = %cli.env_file.display(), count = env_file.len(), "Env file read");

    let settings = Settings::from_source(&Layered::new(ProcessEnv, &env_file)).inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;
    let engine_options = cli.engine_options(&env_file)?;

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&settings.public_view())?);
        }
        Some(Commands::CheckDb) => {
            let engine = Engine::build(&settings.database_uri(), engine_options)?;
            let result = health::check_database(&engine).await;
            engine.close().await;
            result?;
            tracing::info!("Database reachable");
        }
        None => {
            tracing::info!("Starting backend v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!(
                environment = %settings.environment(),
                server_host = %settings.server_host(),
                cors_origins = ?settings.cors_origins(),
                "Settings loaded"
            );

            let engine = Engine::build(&settings.database_uri(), engine_options)?;
            if let Err(e) = health::check_database(&engine).await {
                tracing::error!(error = %e, url = %engine.redacted_url(), "Database check failed");
                engine.close().await;
                return Err(e.into());
            }

            tracing::info!(stats = ?engine.stats(), "Backend ready");
            engine.close().await;
        }
    }

    Ok(())
}
