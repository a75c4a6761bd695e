// ── Runtime configuration ──
//
// These types describe how the supervisor behaves: which radio it owns,
// what access point it raises, and how often it looks around. They never
// touch disk. The binary builds a `CoreConfig` from tether-config and
// hands it in.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Longest SSID 802.11 allows, in bytes.
pub const MAX_SSID_BYTES: usize = 32;

/// Access-point profile and credentials.
#[derive(Debug, Clone)]
pub struct AccessPointConfig {
    /// NetworkManager connection profile name.
    pub profile: String,
    pub ssid: String,
    pub passphrase: SecretString,
}

/// Bounded retry for hotspot activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbiterTiming {
    pub interval: Duration,
    /// Delay before the first evaluation, so the host network stack can settle.
    pub settle_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorTiming {
    pub interval: Duration,
    /// Per-probe deadline within one cycle.
    pub probe_timeout: Duration,
}

/// Allowance over one aggregation interval for cycles that take longer
/// to collect than the one before.
pub const STALE_SLACK: Duration = Duration::from_secs(1);

impl AggregatorTiming {
    /// Age past which a snapshot has missed its refresh.
    pub fn stale_after(&self) -> Duration {
        self.interval.saturating_add(STALE_SLACK)
    }
}

/// Timing of the asynchronous join sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinTiming {
    /// Grace period between accepting a request and touching the radio,
    /// so the HTTP response reaches a client still on the hotspot.
    pub handoff_delay: Duration,
    /// Deadline for the join command itself.
    pub timeout: Duration,
    /// Wait after the join command before checking the link.
    pub verify_delay: Duration,
}

/// Configuration for the connectivity supervisor.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Wireless interface the supervisor owns.
    pub interface: String,
    pub access_point: AccessPointConfig,
    pub retry: RetryPolicy,
    pub arbiter: ArbiterTiming,
    pub aggregator: AggregatorTiming,
    pub join: JoinTiming,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            interface: "wlP1p1s0".into(),
            access_point: AccessPointConfig {
                profile: "OM1-Hotspot".into(),
                ssid: "OM1-Hotspot".into(),
                passphrase: SecretString::from("openmind"),
            },
            retry: RetryPolicy {
                attempts: 3,
                delay: Duration::from_secs(5),
            },
            arbiter: ArbiterTiming {
                interval: Duration::from_secs(10),
                settle_delay: Duration::from_secs(15),
            },
            aggregator: AggregatorTiming {
                interval: Duration::from_secs(5),
                probe_timeout: Duration::from_secs(4),
            },
            join: JoinTiming {
                handoff_delay: Duration::from_secs(5),
                timeout: Duration::from_secs(20),
                verify_delay: Duration::from_secs(5),
            },
        }
    }
}

impl CoreConfig {
    /// Reject configurations the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interface.trim().is_empty() {
            return Err(config_error("interface must not be empty"));
        }
        if self.access_point.profile.trim().is_empty() {
            return Err(config_error("hotspot profile name must not be empty"));
        }
        validate_ssid(&self.access_point.ssid).map_err(|e| config_error(format!("ap_ssid: {e}")))?;
        validate_passphrase(&self.access_point.passphrase)
            .map_err(|e| config_error(format!("ap_passphrase: {e}")))?;
        if self.retry.attempts == 0 {
            return Err(config_error("retry_attempts must be at least 1"));
        }
        if self.arbiter.interval.is_zero() || self.aggregator.interval.is_zero() {
            return Err(config_error("arbiter and aggregator intervals must be non-zero"));
        }
        if self.aggregator.probe_timeout.is_zero() {
            return Err(config_error("probe_timeout_secs must be non-zero"));
        }
        if self.aggregator.probe_timeout >= self.aggregator.interval {
            tracing::warn!(
                probe_timeout = ?self.aggregator.probe_timeout,
                interval = ?self.aggregator.interval,
                "probe timeout is not shorter than the aggregation interval; cycles will be skipped"
            );
        }
        if self.join.timeout.is_zero() {
            return Err(config_error("join_timeout_secs must be non-zero"));
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> CoreError {
    CoreError::Config {
        message: message.into(),
    }
}

/// An SSID must be 1..=32 bytes after trimming.
pub fn validate_ssid(ssid: &str) -> Result<(), CoreError> {
    let ssid = ssid.trim();
    if ssid.is_empty() {
        return Err(CoreError::Validation {
            message: "SSID cannot be empty".into(),
        });
    }
    if ssid.len() > MAX_SSID_BYTES {
        return Err(CoreError::Validation {
            message: format!("SSID exceeds {MAX_SSID_BYTES} bytes"),
        });
    }
    Ok(())
}

/// WPA2 passphrases are 8..=63 printable ASCII characters.
pub fn validate_passphrase(passphrase: &SecretString) -> Result<(), CoreError> {
    let pw = passphrase.expose_secret();
    if !(8..=63).contains(&pw.len()) {
        return Err(CoreError::Validation {
            message: "passphrase must be 8 to 63 characters".into(),
        });
    }
    if !pw.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(CoreError::Validation {
            message: "passphrase must be printable ASCII".into(),
        });
    }
    Ok(())
}

// ── Host integration settings ────────────────────────────────────────

/// Media carried by a supervised stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

/// A container to report on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Key in the snapshot.
    pub name: String,
    /// Name, or name fragment, matched against `docker ps`.
    pub container: String,
}

/// A media stream to report on.
///
/// Supervisor-managed streams name a `program`; streams published by
/// other processes (ROS2 camera bridges) leave it unset and are judged
/// by RTSP liveness alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    pub name: String,
    pub container: String,
    pub media: MediaKind,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub rtsp_path: Option<String>,
    /// Character device the stream reads from, checked for local streams.
    #[serde(default)]
    pub device: Option<String>,
    /// Cloud relays have no local device or RTSP path to check.
    #[serde(default)]
    pub cloud: bool,
}

/// Where the host tools live and what to monitor.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub nmcli: PathBuf,
    pub docker: PathBuf,
    pub command_timeout: Duration,
    pub orchestrator_url: String,
    pub containers: Vec<ContainerSpec>,
    pub streams: Vec<StreamSpec>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            nmcli: PathBuf::from(tether_host::nmcli::DEFAULT_NMCLI),
            docker: PathBuf::from(tether_host::docker::DEFAULT_DOCKER),
            command_timeout: Duration::from_secs(15),
            orchestrator_url: tether_host::services::DEFAULT_ORCHESTRATOR_URL.into(),
            containers: default_containers(),
            streams: default_streams(),
        }
    }
}

impl HostConfig {
    /// Subsystem names must be unique across containers, streams and services.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.command_timeout.is_zero() {
            return Err(config_error("command_timeout_secs must be non-zero"));
        }
        let mut seen = HashSet::new();
        seen.insert(crate::host::SERVICES_SUBSYSTEM);
        let names = self
            .containers
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.streams.iter().map(|s| s.name.as_str()));
        for name in names {
            if name.trim().is_empty() {
                return Err(config_error("subsystem names must not be empty"));
            }
            if !seen.insert(name) {
                return Err(config_error(format!("duplicate subsystem name `{name}`")));
            }
        }
        Ok(())
    }
}

pub fn default_containers() -> Vec<ContainerSpec> {
    [
        ("video_processor", "om1_video_processor"),
        ("ros2_sensor", "om1_sensor"),
        ("orchestrator", "orchestrator"),
    ]
    .into_iter()
    .map(|(name, container)| ContainerSpec {
        name: name.into(),
        container: container.into(),
    })
    .collect()
}

pub fn default_streams() -> Vec<StreamSpec> {
    let supervised = |name: &str, program: &str, media, rtsp: Option<&str>, device: Option<&str>| {
        StreamSpec {
            name: name.into(),
            container: "om1_sensor".into(),
            media,
            program: Some(program.into()),
            rtsp_path: rtsp.map(Into::into),
            device: device.map(Into::into),
            cloud: false,
        }
    };
    let ros_camera = |name: &str| StreamSpec {
        name: name.into(),
        container: "om1_sensor".into(),
        media: MediaKind::Video,
        program: None,
        rtsp_path: Some(name.into()),
        device: None,
        cloud: false,
    };
    vec![
        supervised("audio", "mic_local", MediaKind::Audio, Some("audio"), None),
        supervised(
            "top_camera",
            "top_camera_local",
            MediaKind::Video,
            Some("top_camera"),
            Some("/dev/video0"),
        ),
        StreamSpec {
            cloud: true,
            ..supervised("audio_cloud", "mic_cloud", MediaKind::Audio, None, None)
        },
        StreamSpec {
            cloud: true,
            ..supervised("top_camera_cloud", "top_camera_cloud", MediaKind::Video, None, None)
        },
        ros_camera("front_camera"),
        ros_camera("down_camera"),
    ]
}
