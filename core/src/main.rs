use clap::Parser;
use kafkacli::cli::{Cli, Command};
use kafkacli::{consume, groups, produce, EnvDefaults, Result};
use std::process::ExitCode;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env = match EnvDefaults::from_env() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let requested = cli.log_level(&env);
    let level = parse_log_level(&requested);

    // Logs go to stderr; stdout carries only messages and reports.
    tracing_subscriber::fmt()
        .with_max_level(level.unwrap_or(tracing::Level::INFO))
        .with_writer(std::io::stderr)
        .init();

    if level.is_none() {
        warn!("Invalid log level '{}', defaulting to 'info'", requested);
    }

    match run(cli, &env).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, env: &EnvDefaults) -> Result<()> {
    match cli.into_command(env)? {
        Command::Consume(config) => {
            let report = consume::run(config).await?;
            debug!(termination = ?report.termination, metrics = ?report.metrics, "Consume finished");
            Ok(())
        }
        Command::Produce(config) => produce::run(config).await,
        Command::ConsumerGroups(config) => groups::run(config).await,
    }
}

fn parse_log_level(level: &str) -> Option<tracing::Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(tracing::Level::TRACE),
        "debug" => Some(tracing::Level::DEBUG),
        "info" => Some(tracing::Level::INFO),
        "warn" => Some(tracing::Level::WARN),
        "error" => Some(tracing::Level::ERROR),
        _ => None,
    }
}
