use thiserror::Error;

/// Top-level error type for the `tether-host` crate.
///
/// Covers every failure mode across the host surfaces:
/// subprocess execution (nmcli, docker) and the orchestrator HTTP endpoint.
/// `tether-core` maps these into executor and subsystem errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Subprocess ──────────────────────────────────────────────────
    /// The program could not be started at all (missing binary, EACCES, ...).
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program did not finish before the per-command deadline.
    #[error("`{program}` timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    /// The program ran but exited unsuccessfully.
    #[error("`{program}` exited with {}: {stderr}", code.map_or_else(|| "signal".to_owned(), |c| format!("status {c}")))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Output did not match the expected terse format.
    #[error("Unexpected {what} output: {message}")]
    Parse { what: &'static str, message: String },

    // ── HTTP ────────────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::NonZeroExit { .. } => !self.is_permission_denied(),
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the host refused the operation for lack of rights.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Spawn { source, .. } => source.kind() == std::io::ErrorKind::PermissionDenied,
            Self::NonZeroExit { stderr, .. } => {
                let lower = stderr.to_ascii_lowercase();
                lower.contains("not authorized")
                    || lower.contains("permission denied")
                    || lower.contains("insufficient privileges")
            }
            _ => false,
        }
    }

    /// Returns `true` if the program itself is missing from the host.
    pub fn is_missing_program(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
