mod cli;
mod config;
mod core;
mod domain;
mod errors;

use std::env;
use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::core::client::graylog_client::GraylogClient;
use crate::domain::interval::service;
use crate::domain::trace::orchestrator::TraceRunner;
use crate::errors::TracerError;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = cli::Cli::parse();
    let _guard = init_tracing();

    let config = config::load_config()?;

    let interval = match (&args.from, &args.to) {
        (Some(from), Some(to)) => service::resolve_explicit(from, to)?,
        (None, None) => service::resolve_from_config(&config.default_interval)?,
        _ => {
            return Err(TracerError::Configuration(
                "provide both --from and --to, or omit both to use the .env interval".into(),
            )
            .into())
        }
    };
    info!(
        from = %interval.from_utc,
        to = %interval.to_utc,
        "resolved search interval"
    );

    let request_fields: Option<Vec<String>> = if args.no_fields {
        None
    } else {
        Some(config::DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect())
    };

    let client = GraylogClient::new(&config.search)?;
    let runner = TraceRunner::new(&client, &config);
    let result = runner.run(&interval, request_fields.as_deref()).await?;
    info!(total = result.summary.total_messages, "run complete");

    let json_str = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => fs::write(path, &json_str)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json_str}"),
    }
    Ok(())
}

/// Logs go to stderr, or to a daily-rolling file under `TRACER_LOG_DIR`
/// when set. The stdout stream carries only the JSON document.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Ok(dir) = env::var("TRACER_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(dir, "issue-tracer.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        None
    }
}
