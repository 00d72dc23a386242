//! logward-daemon entry point.
//!
//! Process-level contract: every fatal configuration or startup error is
//! printed to stderr regardless of the configured log destination, and the
//! process exits nonzero. A healthy pipeline runs until SIGTERM/SIGINT
//! (clean exit 0); SIGHUP reloads the whole pipeline in place.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use logward_acquisition::datasource::MetricsLevel;
use logward_core::config::LogwardConfig;
use logward_daemon::cli::DaemonCli;
use logward_daemon::orchestrator::Orchestrator;
use logward_daemon::logging;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => {}
        Err(e) => {
            // Operators running under a supervisor without log aggregation
            // must still see the cause on the error stream.
            eprintln!("logward-daemon: fatal: {e:#}");
            tracing::error!(error = format!("{e:#}"), "fatal error, exiting");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = LogwardConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    // CLI overrides take precedence over file and environment.
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config.validate().context("invalid configuration")?;

    if cli.validate {
        let report = logward_acquisition::load(&config.acquisition, MetricsLevel::None).await?;
        println!(
            "configuration OK: {} ({} data source(s), {} warning(s))",
            cli.config.display(),
            report.sources.len(),
            report.warnings.len()
        );
        for warning in report.warnings {
            println!("warning: {warning}");
        }
        return Ok(());
    }

    let logging = logging::init(&config.general)?;
    tracing::info!(config = %cli.config.display(), "logward-daemon starting");

    let pid_file = config.general.pid_file.clone();
    if !pid_file.is_empty() {
        write_pid_file(Path::new(&pid_file))?;
    }

    let mut orchestrator =
        Orchestrator::from_config(cli.config.clone(), config).with_logging(logging);
    let result = orchestrator.run().await;

    if !pid_file.is_empty() {
        remove_pid_file(Path::new(&pid_file));
    }

    result?;
    tracing::info!("logward-daemon shut down");
    Ok(())
}

/// Write the current process PID, refusing to clobber a live instance.
fn write_pid_file(path: &Path) -> Result<()> {
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = std::fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            anyhow::bail!(
                "PID file {} already exists with PID {}. Is another instance running?",
                path.display(),
                existing.trim()
            );
        }
        Err(e) => return Err(e.into()),
    };

    writeln!(file, "{}", std::process::id())?;
    tracing::info!(pid = std::process::id(), path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on shutdown; a failure is only a warning.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    }
}
