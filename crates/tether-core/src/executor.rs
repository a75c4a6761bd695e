// ── Host command seam ──
//
// Everything the supervisor does to the host network goes through
// `CommandExecutor`. Production wires in the nmcli-backed executor from
// `crate::host`; tests substitute a scripted fake.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;

use crate::error::ExecError;

/// Link layer of an active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Wireless,
    Ethernet,
    Other,
}

impl ConnectionKind {
    /// Map a NetworkManager connection type string.
    pub fn from_nm_type(conn_type: &str) -> Self {
        match conn_type {
            "802-11-wireless" | "wifi" => Self::Wireless,
            "802-3-ethernet" | "ethernet" => Self::Ethernet,
            _ => Self::Other,
        }
    }
}

/// One active host connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveConnection {
    pub name: String,
    pub kind: ConnectionKind,
    pub device: Option<String>,
}

/// Current state of one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceState {
    pub interface: String,
    pub state: String,
    pub connected: bool,
    /// Connection profile bound to the interface.
    pub connection: Option<String>,
}

/// A network seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedNetwork {
    pub ssid: String,
    pub signal: u8,
    pub security: String,
    pub in_use: bool,
}

/// Everything needed to provision the access-point profile.
#[derive(Debug, Clone)]
pub struct AccessPointSpec {
    pub profile: String,
    pub interface: String,
    pub ssid: String,
    pub passphrase: SecretString,
}

/// Outcome of a deactivate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deactivation {
    Deactivated,
    /// The profile was not active to begin with.
    NotActive,
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn active_connections(&self) -> Result<Vec<ActiveConnection>, ExecError>;

    /// `Ok(None)` when the interface does not exist.
    async fn interface_state(&self, interface: &str) -> Result<Option<InterfaceState>, ExecError>;

    async fn scan(&self, interface: &str) -> Result<Vec<ScannedNetwork>, ExecError>;

    /// Create the access-point profile if it does not exist yet.
    async fn ensure_access_point(&self, spec: &AccessPointSpec) -> Result<(), ExecError>;

    async fn activate(&self, profile: &str) -> Result<(), ExecError>;

    async fn deactivate(&self, profile: &str) -> Result<Deactivation, ExecError>;

    async fn join(
        &self,
        interface: &str,
        ssid: &str,
        password: Option<&SecretString>,
    ) -> Result<(), ExecError>;

    /// Delete a stored connection profile.
    async fn forget(&self, profile: &str) -> Result<(), ExecError>;

    async fn disconnect(&self, interface: &str) -> Result<(), ExecError>;
}
