//! Clap derive structures for the `tether` binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tether -- keeps a headless robot reachable over WiFi
#[derive(Debug, Parser)]
#[command(
    name = "tether",
    version,
    about = "Keep a headless robot reachable: hotspot when offline, client when an uplink exists",
    long_about = "Arbitrates a single WiFi radio between access-point and client mode.\n\n\
        With no uplink the robot raises its own hotspot so an operator can\n\
        configure it; once a network is joined the hotspot is dropped. An HTTP\n\
        API reports network mode, container, stream and service health.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to /etc/tether/tether.toml)
    #[arg(long, short = 'c', env = "TETHER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Console log format
    #[arg(long, env = "TETHER_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the supervisor and HTTP API
    Serve(ServeArgs),

    /// Probe connectivity and subsystems once, print JSON and exit
    Check,

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address (overrides `listen` from the config)
    #[arg(long, short = 'l')]
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration with secrets redacted
    Show,
}
