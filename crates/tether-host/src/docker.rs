// Container runtime client
//
// Wraps the `docker` CLI for the read-only queries the status layer needs:
// container state, supervisor programs inside a container, device presence,
// and local RTSP liveness via ffprobe.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::Error;
use crate::models::{ContainerState, SupervisorProgram};
use crate::runner::CommandRunner;

pub const DEFAULT_DOCKER: &str = "docker";

const RTSP_BASE: &str = "rtsp://localhost:8554";

/// Raw `docker` client.
#[derive(Debug, Clone)]
pub struct Docker {
    runner: CommandRunner,
}

impl Docker {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            runner: CommandRunner::new(binary, timeout),
        }
    }

    /// Resolve a name pattern to an actual container name.
    ///
    /// Running containers are searched first, then stopped ones. An exact
    /// match wins; otherwise the shortest name containing the pattern.
    pub async fn find_container(&self, pattern: &str) -> Result<Option<String>, Error> {
        let filter = format!("name={pattern}");
        let mut out = self
            .runner
            .run(["ps", "--filter", &filter, "--format", "{{.Names}}"])
            .await?;
        if !out.success() || out.stdout.trim().is_empty() {
            out = self
                .runner
                .run(["ps", "-a", "--filter", &filter, "--format", "{{.Names}}"])
                .await?;
        }
        if !out.success() {
            return Ok(None);
        }
        Ok(pick_container_name(&out.stdout, pattern))
    }

    /// `docker inspect` the container's state and start time.
    pub async fn inspect_state(&self, container: &str) -> Result<ContainerState, Error> {
        let out = self
            .runner
            .run_checked([
                "inspect",
                container,
                "--format",
                "{{.State.Status}}|{{.State.Running}}|{{.State.StartedAt}}",
            ])
            .await?;
        parse_inspect_state(container, &out.stdout)
    }

    /// `supervisorctl status` inside the container.
    ///
    /// supervisorctl exits non-zero whenever any program is not RUNNING, so
    /// the exit status alone is not treated as failure.
    pub async fn supervisor_status(&self, container: &str) -> Result<Vec<SupervisorProgram>, Error> {
        let out = self
            .runner
            .run(["exec", container, "supervisorctl", "status"])
            .await?;
        let programs = parse_supervisor_status(&out.stdout);
        if programs.is_empty() {
            return Err(Error::NonZeroExit {
                program: "supervisorctl".into(),
                code: out.code,
                stderr: if out.stderr.is_empty() {
                    "no supervisor programs found".into()
                } else {
                    out.stderr
                },
            });
        }
        Ok(programs)
    }

    /// Whether a character device exists inside the container.
    pub async fn device_present(&self, container: &str, device: &str) -> Result<bool, Error> {
        let out = self
            .runner
            .run(["exec", container, "test", "-c", device])
            .await?;
        Ok(out.success())
    }

    /// Whether PulseAudio answers inside the container.
    pub async fn audio_available(&self, container: &str) -> Result<bool, Error> {
        let out = self.runner.run(["exec", container, "pactl", "info"]).await?;
        Ok(out.success())
    }

    /// Probe a local RTSP path with ffprobe. Returns the codec types seen,
    /// or `None` when nothing is streaming.
    pub async fn rtsp_codecs(&self, container: &str, path: &str) -> Result<Option<String>, Error> {
        let url = format!("{RTSP_BASE}/{path}");
        let out = self
            .runner
            .run([
                "exec",
                container,
                "ffprobe",
                "-v",
                "error",
                "-show_entries",
                "stream=codec_type",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                &url,
            ])
            .await?;
        let codecs = out.stdout.trim();
        if out.success() && !codecs.is_empty() {
            Ok(Some(codecs.replace('\n', ",")))
        } else {
            debug!(%url, stderr = %out.stderr, "no rtsp stream data");
            Ok(None)
        }
    }
}

// ── Parsing ──────────────────────────────────────────────────────────

pub(crate) fn pick_container_name(stdout: &str, pattern: &str) -> Option<String> {
    let names: Vec<&str> = stdout.lines().map(str::trim).filter(|n| !n.is_empty()).collect();
    if let Some(exact) = names.iter().find(|n| **n == pattern) {
        return Some((*exact).to_owned());
    }
    names
        .into_iter()
        .filter(|n| n.contains(pattern))
        .min_by_key(|n| n.len())
        .map(str::to_owned)
}

pub(crate) fn parse_inspect_state(container: &str, stdout: &str) -> Result<ContainerState, Error> {
    let mut parts = stdout.trim().split('|');
    let (Some(status), Some(running)) = (parts.next(), parts.next()) else {
        return Err(Error::Parse {
            what: "docker inspect",
            message: format!("expected `status|running`, got {:?}", stdout.trim()),
        });
    };
    Ok(ContainerState {
        name: container.to_owned(),
        status: status.to_owned(),
        running: running.eq_ignore_ascii_case("true"),
        started_at: parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.starts_with("0001-01-01"))
            .map(str::to_owned),
    })
}

/// Lines look like `mic_local   RUNNING   pid 42, uptime 0:10:00`.
pub(crate) fn parse_supervisor_status(stdout: &str) -> Vec<SupervisorProgram> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| {
            !l.is_empty() && !l.contains("UserWarning") && !l.contains("pkg_resources") && !l.starts_with("/usr/")
        })
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            let name = words.next()?;
            let status = words.next()?;
            let pid = match (words.next(), words.next()) {
                (Some("pid"), Some(p)) => p.trim_end_matches(',').parse().ok(),
                _ => None,
            };
            Some(SupervisorProgram {
                name: name.to_owned(),
                status: status.to_owned(),
                pid,
            })
        })
        .collect()
}
