// Raw host-side records.
//
// These mirror what the host tools print, one struct per output line.
// `tether-core` converts them into its own domain types.

use serde::{Deserialize, Serialize};

/// One line of `nmcli device status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub device: String,
    pub state: String,
    /// `None` when nmcli prints `--`.
    pub connection: Option<String>,
}

impl DeviceStatus {
    /// `connected`, but not `connected (externally)` which NetworkManager
    /// reports for links it merely observes.
    pub fn is_connected(&self) -> bool {
        let state = self.state.to_ascii_lowercase();
        state.starts_with("connected") && !state.contains("externally")
    }
}

/// One line of `nmcli connection show --active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveConnectionEntry {
    pub name: String,
    /// NetworkManager connection type, e.g. `802-11-wireless`, `802-3-ethernet`.
    pub conn_type: String,
    pub device: Option<String>,
}

/// One line of `nmcli device wifi list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiListEntry {
    pub ssid: String,
    pub signal: u8,
    pub security: String,
    pub in_use: bool,
}

/// Parameters for a NetworkManager access-point profile.
#[derive(Debug, Clone)]
pub struct AccessPointProfile<'a> {
    pub name: &'a str,
    pub interface: &'a str,
    pub ssid: &'a str,
    pub passphrase: &'a secrecy::SecretString,
}

/// `docker inspect` state of a single container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub name: String,
    /// Docker's state string: `running`, `exited`, `restarting`, ...
    pub status: String,
    pub running: bool,
    pub started_at: Option<String>,
}

/// One program line of `supervisorctl status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorProgram {
    pub name: String,
    pub status: String,
    pub pid: Option<u32>,
}

impl SupervisorProgram {
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("RUNNING")
    }
}

/// Parsed robot orchestrator status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatus {
    #[serde(default = "unknown", rename = "slam_status")]
    pub slam: String,
    #[serde(default = "unknown", rename = "nav2_status")]
    pub nav2: String,
    #[serde(default = "unknown", rename = "base_control_status")]
    pub base_control: String,
    #[serde(default = "unknown", rename = "charging_dock_status")]
    pub charging_dock: String,
    #[serde(default)]
    pub is_charging: bool,
    #[serde(default)]
    pub battery_soc: f64,
}

fn unknown() -> String {
    "unknown".into()
}
