// Shared subprocess execution for the host clients.
//
// Both the nmcli and docker clients share timeout and output handling
// through this module, avoiding duplicated spawn/wait logic.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::Error;

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a single program with a fixed deadline.
///
/// Children are killed when the deadline elapses (`kill_on_drop`), so a
/// timed-out command never outlives the caller's view of it.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Same program, different deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            program: self.program.clone(),
            timeout,
        }
    }

    /// Run the program and capture its output regardless of exit status.
    pub async fn run<I, S>(&self, args: I) -> Result<CommandOutput, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.program.display().to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!(%program, "spawning");
        let child = cmd.spawn().map_err(|source| Error::Spawn {
            program: program.clone(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout {
                program: program.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|source| Error::Spawn {
                program: program.clone(),
                source,
            })?;

        let out = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        };
        debug!(%program, code = ?out.code, "command finished");
        Ok(out)
    }

    /// Run the program and fail on a non-zero exit status.
    pub async fn run_checked<I, S>(&self, args: I) -> Result<CommandOutput, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let out = self.run(args).await?;
        if out.success() {
            Ok(out)
        } else {
            Err(Error::NonZeroExit {
                program: self.program.display().to_string(),
                code: out.code,
                stderr: out.stderr,
            })
        }
    }
}
