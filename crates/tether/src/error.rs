//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use std::net::SocketAddr;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use tether_config::ConfigError;
use tether_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(tether::config::invalid),
        help("Fix the value in the config file or the matching TETHER_* variable.")
    )]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration file not found: {}", path.display())]
    #[diagnostic(
        code(tether::config::not_found),
        help("Pass an existing file with --config, or unset TETHER_CONFIG to use defaults.")
    )]
    ConfigNotFound { path: PathBuf },

    #[error(transparent)]
    #[diagnostic(code(tether::config::load))]
    ConfigLoad(Box<figment::Error>),

    #[error("Startup check failed: {message}")]
    #[diagnostic(
        code(tether::startup),
        help("Check that the `interface` setting names the robot's wireless device (see `nmcli device`).")
    )]
    Startup { message: String },

    // ── Privileges ───────────────────────────────────────────────────
    #[error("Insufficient privileges: {message}")]
    #[diagnostic(
        code(tether::privilege),
        help(
            "Run as root, or set require_root = false if NetworkManager\n\
             authorises this user through polkit."
        )
    )]
    Privilege { message: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Could not listen on {addr}")]
    #[diagnostic(
        code(tether::bind),
        help("Another process may own the port. Change `listen` or pass --listen.")
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not open monitoring log {}", path.display())]
    #[diagnostic(code(tether::monitor_log))]
    MonitorLog {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid request: {message}")]
    #[diagnostic(code(tether::validation))]
    Validation { message: String },

    #[error(transparent)]
    #[diagnostic(code(tether::core))]
    Core(CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(tether::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. }
            | Self::ConfigNotFound { .. }
            | Self::ConfigLoad(_)
            | Self::Startup { .. }
            | Self::MonitorLog { .. } => exit_code::CONFIG,
            Self::Privilege { .. } => exit_code::PERMISSION,
            Self::Bind { .. } => exit_code::CONNECTION,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Core(_) | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::InvalidConfig { field, reason },
            ConfigError::NotFound { path } => Self::ConfigNotFound { path },
            ConfigError::Figment(e) => Self::ConfigLoad(e),
            ConfigError::Serialization(e) => Self::InvalidConfig {
                field: "config".into(),
                reason: e.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => Self::Startup { message },
            CoreError::Privilege { message } => Self::Privilege { message },
            CoreError::Validation { message } => Self::Validation { message },
            other => Self::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_failures_exit_with_config_code() {
        let err = CliError::from(ConfigError::NotFound {
            path: PathBuf::from("/nope.toml"),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);

        let err = CliError::from(CoreError::Config {
            message: "wireless interface `wlan9` not found".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn privilege_failure_exits_with_permission_code() {
        let err = CliError::from(CoreError::Privilege {
            message: "`nmcli`: Not authorized".into(),
        });
        assert_eq!(err.exit_code(), exit_code::PERMISSION);
    }
}
