//! Configuration for the tether daemon.
//!
//! Built-in defaults, an optional TOML file and `TETHER_*` environment
//! variables, merged with figment and translated into
//! `tether_core::{CoreConfig, HostConfig}`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use tether_core::config::{default_containers, default_streams};
use tether_core::{
    AccessPointConfig, AggregatorTiming, ArbiterTiming, ContainerSpec, CoreConfig, CoreError,
    HostConfig, JoinTiming, RetryPolicy, StreamSpec,
};

/// Used when neither `--config` nor `TETHER_CONFIG` names a file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/tether/tether.toml";

/// Prefix of every recognised environment variable.
pub const ENV_PREFIX: &str = "TETHER_";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<CoreError> for ConfigError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => {
                let (field, reason) = message
                    .split_once(": ")
                    .map_or(("config", message.as_str()), |(f, r)| (f, r));
                Self::Validation {
                    field: field.to_owned(),
                    reason: reason.to_owned(),
                }
            }
            other => Self::Validation {
                field: "config".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── TOML config struct ──────────────────────────────────────────────

/// Flat daemon configuration.
///
/// Scalar keys can come from any source; `containers` and `streams` are
/// only read from the TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Wireless interface owned by the daemon.
    pub interface: String,
    pub ap_ssid: String,
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub ap_passphrase: SecretString,
    /// NetworkManager connection name of the access point.
    pub hotspot_profile: String,

    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub arbiter_interval_secs: u64,
    pub settle_delay_secs: u64,
    pub aggregator_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub join_timeout_secs: u64,
    pub join_handoff_delay_secs: u64,
    pub join_verify_delay_secs: u64,
    pub command_timeout_secs: u64,

    /// HTTP listen address.
    pub listen: SocketAddr,
    /// File receiving the `tether::monitor` log target.
    pub monitor_log: Option<PathBuf>,
    pub require_root: bool,

    pub nmcli_path: PathBuf,
    pub docker_path: PathBuf,
    pub orchestrator_url: String,

    pub containers: Vec<ContainerSpec>,
    pub streams: Vec<StreamSpec>,
}

impl Default for Config {
    fn default() -> Self {
        let core = CoreConfig::default();
        let host = HostConfig::default();
        Self {
            interface: core.interface,
            ap_ssid: core.access_point.ssid,
            ap_passphrase: core.access_point.passphrase,
            hotspot_profile: core.access_point.profile,
            retry_attempts: core.retry.attempts,
            retry_delay_secs: core.retry.delay.as_secs(),
            arbiter_interval_secs: core.arbiter.interval.as_secs(),
            settle_delay_secs: core.arbiter.settle_delay.as_secs(),
            aggregator_interval_secs: core.aggregator.interval.as_secs(),
            probe_timeout_secs: core.aggregator.probe_timeout.as_secs(),
            join_timeout_secs: core.join.timeout.as_secs(),
            join_handoff_delay_secs: core.join.handoff_delay.as_secs(),
            join_verify_delay_secs: core.join.verify_delay.as_secs(),
            command_timeout_secs: host.command_timeout.as_secs(),
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            monitor_log: None,
            require_root: true,
            nmcli_path: host.nmcli,
            docker_path: host.docker,
            orchestrator_url: host.orchestrator_url,
            containers: default_containers(),
            streams: default_streams(),
        }
    }
}

impl Config {
    /// Translate into the runtime configuration, validating as we go.
    pub fn to_core(&self) -> Result<(CoreConfig, HostConfig), ConfigError> {
        let core = CoreConfig {
            interface: self.interface.trim().to_owned(),
            access_point: AccessPointConfig {
                profile: self.hotspot_profile.clone(),
                ssid: self.ap_ssid.clone(),
                passphrase: self.ap_passphrase.clone(),
            },
            retry: RetryPolicy {
                attempts: self.retry_attempts,
                delay: secs(self.retry_delay_secs),
            },
            arbiter: ArbiterTiming {
                interval: secs(self.arbiter_interval_secs),
                settle_delay: secs(self.settle_delay_secs),
            },
            aggregator: AggregatorTiming {
                interval: secs(self.aggregator_interval_secs),
                probe_timeout: secs(self.probe_timeout_secs),
            },
            join: JoinTiming {
                handoff_delay: secs(self.join_handoff_delay_secs),
                timeout: secs(self.join_timeout_secs),
                verify_delay: secs(self.join_verify_delay_secs),
            },
        };
        core.validate()?;

        url::Url::parse(&self.orchestrator_url).map_err(|e| ConfigError::Validation {
            field: "orchestrator_url".into(),
            reason: e.to_string(),
        })?;

        let host = HostConfig {
            nmcli: self.nmcli_path.clone(),
            docker: self.docker_path.clone(),
            command_timeout: secs(self.command_timeout_secs),
            orchestrator_url: self.orchestrator_url.clone(),
            containers: self.containers.clone(),
            streams: self.streams.clone(),
        };
        host.validate()?;

        Ok((core, host))
    }

    /// TOML rendering with secrets replaced.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut value = toml::Value::try_from(self)?;
        if let Some(table) = value.as_table_mut() {
            table.insert("ap_passphrase".into(), toml::Value::String(REDACTED.into()));
        }
        Ok(toml::to_string_pretty(&value)?)
    }
}

fn deserialize_secret<'de, D: Deserializer<'de>>(de: D) -> Result<SecretString, D::Error> {
    String::deserialize(de).map(SecretString::from)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// ── Config loading ──────────────────────────────────────────────────

/// Which file to read: the explicit path if given, else the default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf)
}

/// Merge defaults, the TOML file and `TETHER_*` variables.
///
/// A missing default file is fine; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = config_path(explicit);
    if explicit.is_some() && !path.exists() {
        return Err(ConfigError::NotFound { path });
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config", "log", "log_format"]));

    let config: Config = figment.extract()?;
    Ok(config)
}
