//! CLI argument definitions for logward-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Logward log acquisition and correlation daemon.
///
/// Loads the acquisition configuration, supervises every data source,
/// and feeds normalized events to the correlation stage. SIGHUP tears
/// down and rebuilds the whole pipeline without restarting the process.
#[derive(Parser, Debug)]
#[command(name = "logward-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logward.toml configuration file.
    #[arg(short, long, default_value = "/etc/logward/logward.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration (including acquisition documents) and exit
    /// without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
