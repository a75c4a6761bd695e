// ── Core error types ──
//
// User-facing errors from tether-core. Consumers never see raw process
// exit codes or HTTP failures: executor implementations report
// `ExecError`, and the arbiter, hotspot controller and join manager
// lift those into `CoreError` variants with an operation attached.

use thiserror::Error;

use crate::radio::RadioUser;

/// Failure of a single host command issued through a `CommandExecutor`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The command did not finish before its deadline.
    #[error("`{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    /// The command ran and reported failure.
    #[error("`{command}` failed: {message}")]
    Failed { command: String, message: String },

    /// The tool or daemon behind the command is not reachable at all.
    #[error("`{command}` unavailable: {message}")]
    Unavailable { command: String, message: String },

    /// The host refused the command for lack of rights.
    #[error("`{command}` not permitted: {message}")]
    PermissionDenied { command: String, message: String },

    /// The command succeeded but printed something unparseable.
    #[error("Unexpected output from `{command}`: {message}")]
    Parse { command: String, message: String },
}

impl ExecError {
    /// Returns `true` if retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Failed { .. })
    }

    pub fn command(&self) -> &str {
        match self {
            Self::Timeout { command, .. }
            | Self::Failed { command, .. }
            | Self::Unavailable { command, .. }
            | Self::PermissionDenied { command, .. }
            | Self::Parse { command, .. } => command,
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Insufficient privileges: {message}")]
    Privilege { message: String },

    // ── Request errors ───────────────────────────────────────────────
    #[error("Invalid request: {message}")]
    Validation { message: String },

    /// `holder` is `None` when the lock was taken but its owner is not
    /// recorded yet.
    #[error("Radio busy: {} in progress", busy_with(.holder.as_ref()))]
    RadioBusy { holder: Option<RadioUser> },

    // ── Operation errors ─────────────────────────────────────────────
    /// A host command failed and was not retried.
    #[error("{operation} failed: {source}")]
    Command {
        operation: String,
        #[source]
        source: ExecError,
    },

    /// A transient failure persisted through every allowed attempt.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: ExecError,
    },

    // ── Monitoring errors ────────────────────────────────────────────
    #[error("Subsystem {name} unavailable: {reason}")]
    SubsystemUnavailable { name: String, reason: String },
}

fn busy_with(holder: Option<&RadioUser>) -> String {
    holder.map_or_else(|| "another radio operation".to_owned(), |h| h.to_string())
}

impl CoreError {
    /// Attach an operation name to an executor failure.
    ///
    /// Permission failures become [`CoreError::Privilege`] so the binary
    /// can exit with the matching code.
    pub fn from_exec(operation: impl Into<String>, err: ExecError) -> Self {
        match err {
            ExecError::PermissionDenied { command, message } => CoreError::Privilege {
                message: format!("`{command}`: {message}"),
            },
            source => CoreError::Command {
                operation: operation.into(),
                source,
            },
        }
    }

    /// Returns `true` if the failure came from another operation owning the radio.
    pub fn is_radio_busy(&self) -> bool {
        matches!(self, Self::RadioBusy { .. })
    }
}

impl From<ExecError> for CoreError {
    fn from(err: ExecError) -> Self {
        let operation = err.command().to_owned();
        CoreError::from_exec(operation, err)
    }
}

// ── Conversion from host-layer errors ────────────────────────────────

impl From<tether_host::Error> for ExecError {
    fn from(err: tether_host::Error) -> Self {
        let command = match &err {
            tether_host::Error::Spawn { program, .. }
            | tether_host::Error::Timeout { program, .. }
            | tether_host::Error::NonZeroExit { program, .. } => program.clone(),
            tether_host::Error::Parse { what, .. } => (*what).to_owned(),
            tether_host::Error::HttpStatus { url, .. } => url.clone(),
            _ => "http".to_owned(),
        };

        if err.is_permission_denied() {
            return ExecError::PermissionDenied {
                command,
                message: err.to_string(),
            };
        }

        match err {
            tether_host::Error::Timeout { timeout_secs, .. } => ExecError::Timeout {
                command,
                timeout_secs,
            },
            tether_host::Error::Spawn { .. } | tether_host::Error::InvalidUrl(_) => {
                ExecError::Unavailable {
                    command,
                    message: err.to_string(),
                }
            }
            tether_host::Error::Transport(ref e) if e.is_connect() => ExecError::Unavailable {
                command,
                message: err.to_string(),
            },
            tether_host::Error::Parse { message, .. }
            | tether_host::Error::Deserialization { message, .. } => {
                ExecError::Parse { command, message }
            }
            tether_host::Error::NonZeroExit { stderr, .. } => ExecError::Failed {
                command,
                message: stderr,
            },
            other => ExecError::Failed {
                command,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_failures_are_transient() {
        let timeout = ExecError::Timeout {
            command: "nmcli".into(),
            timeout_secs: 15,
        };
        let denied = ExecError::PermissionDenied {
            command: "nmcli".into(),
            message: "Not authorized".into(),
        };
        assert!(timeout.is_transient());
        assert!(!denied.is_transient());
    }

    #[test]
    fn host_permission_failure_maps_to_permission_denied() {
        let host = tether_host::Error::NonZeroExit {
            program: "nmcli".into(),
            code: Some(4),
            stderr: "Error: Not authorized to control networking.".into(),
        };
        let exec = ExecError::from(host);
        assert!(matches!(exec, ExecError::PermissionDenied { ref command, .. } if command == "nmcli"));
        assert!(matches!(
            CoreError::from_exec("hotspot start", exec),
            CoreError::Privilege { .. }
        ));
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let host = tether_host::Error::Spawn {
            program: "docker".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let exec = ExecError::from(host);
        assert!(matches!(exec, ExecError::Unavailable { .. }));
        assert!(!exec.is_transient());
    }
}
