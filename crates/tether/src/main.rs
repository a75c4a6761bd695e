mod cli;
mod error;
mod routes;
mod server;

use std::path::Path;

use clap::Parser;
use tracing::{info, level_filters::LevelFilter};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use tether_config::Config;
use tether_core::{MONITOR_TARGET, Supervisor};

use crate::cli::{Cli, Command, ConfigCommand, LogFormat, ServeArgs};
use crate::error::{CliError, exit_code};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => exit_code::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = tether_config::load_config(cli.global.config.as_deref())?;

    // The daemon logs at info by default; one-shot commands stay quiet.
    let floor = match cli.command {
        Command::Serve(_) => LevelFilter::INFO,
        _ => LevelFilter::WARN,
    };
    let monitor_log = match cli.command {
        Command::Serve(_) => config.monitor_log.as_deref(),
        _ => None,
    };
    let _guard = init_tracing(cli.global.verbose, floor, cli.global.log_format, monitor_log)?;

    match cli.command {
        Command::Serve(args) => serve(config, &args).await,
        Command::Check => check(&config).await,
        Command::Config(args) => match args.command {
            ConfigCommand::Show => {
                print!("{}", config.to_redacted_toml()?);
                Ok(())
            }
        },
    }
}

// ── Tracing ──────────────────────────────────────────────────────────

fn init_tracing(
    verbosity: u8,
    floor: LevelFilter,
    format: LogFormat,
    monitor_log: Option<&Path>,
) -> Result<Option<WorkerGuard>, CliError> {
    let requested = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let level = requested.max(floor);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let console: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let (monitor, guard) = match monitor_log {
        Some(path) => {
            let (layer, guard) = monitor_layer(path)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console.with_filter(filter))
        .with(monitor)
        .init();
    Ok(guard)
}

/// Append-only file receiving the monitor target and nothing else.
fn monitor_layer<S>(
    path: &Path,
) -> Result<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard), CliError>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
{
    let (dir, file) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(file)) => (dir, file),
        _ => {
            return Err(CliError::MonitorLog {
                path: path.to_path_buf(),
                source: "path has no file name".into(),
            });
        }
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file.to_string_lossy())
        .build(dir)
        .map_err(|e| CliError::MonitorLog {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(Targets::new().with_target(MONITOR_TARGET, LevelFilter::INFO))
        .boxed();
    Ok((layer, guard))
}

// ── Commands ─────────────────────────────────────────────────────────

async fn serve(config: Config, args: &ServeArgs) -> Result<(), CliError> {
    if config.require_root && !nix::unistd::Uid::effective().is_root() {
        return Err(CliError::Privilege {
            message: "tether must run as root to control the radio".into(),
        });
    }

    let (core, host) = config.to_core()?;
    let listener = server::bind(args.listen.unwrap_or(config.listen)).await?;

    let supervisor = Supervisor::from_host(core, &host)?;
    supervisor.start().await?;
    info!(
        containers = host.containers.len(),
        streams = host.streams.len(),
        "monitoring subsystems"
    );

    let result = server::run(listener, supervisor.clone()).await;
    supervisor.shutdown().await;
    result
}

async fn check(config: &Config) -> Result<(), CliError> {
    let (core, host) = config.to_core()?;
    let supervisor = Supervisor::from_host(core, &host)?;
    let report = supervisor.inspect().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
