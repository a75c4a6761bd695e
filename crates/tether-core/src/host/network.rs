use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tether_host::{AccessPointProfile, Nmcli};
use tracing::debug;

use crate::error::ExecError;
use crate::executor::{
    AccessPointSpec, ActiveConnection, CommandExecutor, ConnectionKind, Deactivation,
    InterfaceState, ScannedNetwork,
};

/// `CommandExecutor` backed by `nmcli`.
#[derive(Debug, Clone)]
pub struct NmcliExecutor {
    nmcli: Nmcli,
    join_timeout: Duration,
}

impl NmcliExecutor {
    /// `join_timeout` bounds the nmcli join command; the join manager
    /// applies its own deadline on top.
    pub fn new(nmcli: Nmcli, join_timeout: Duration) -> Self {
        Self {
            nmcli,
            join_timeout,
        }
    }
}

#[async_trait]
impl CommandExecutor for NmcliExecutor {
    async fn active_connections(&self) -> Result<Vec<ActiveConnection>, ExecError> {
        Ok(self
            .nmcli
            .active_connections()
            .await?
            .into_iter()
            .map(|c| ActiveConnection {
                kind: ConnectionKind::from_nm_type(&c.conn_type),
                name: c.name,
                device: c.device,
            })
            .collect())
    }

    async fn interface_state(&self, interface: &str) -> Result<Option<InterfaceState>, ExecError> {
        Ok(self
            .nmcli
            .device_status()
            .await?
            .into_iter()
            .find(|d| d.device == interface)
            .map(|d| InterfaceState {
                interface: d.device.clone(),
                connected: d.is_connected(),
                state: d.state,
                connection: d.connection,
            }))
    }

    async fn scan(&self, interface: &str) -> Result<Vec<ScannedNetwork>, ExecError> {
        Ok(self
            .nmcli
            .wifi_list(interface)
            .await?
            .into_iter()
            .map(|n| ScannedNetwork {
                ssid: n.ssid,
                signal: n.signal,
                security: n.security,
                in_use: n.in_use,
            })
            .collect())
    }

    async fn ensure_access_point(&self, spec: &AccessPointSpec) -> Result<(), ExecError> {
        let names = self.nmcli.connection_names().await?;
        if names.iter().any(|n| *n == spec.profile) {
            return Ok(());
        }
        debug!(profile = %spec.profile, "creating access point profile");
        self.nmcli
            .add_access_point(&AccessPointProfile {
                name: &spec.profile,
                interface: &spec.interface,
                ssid: &spec.ssid,
                passphrase: &spec.passphrase,
            })
            .await?;
        Ok(())
    }

    async fn activate(&self, profile: &str) -> Result<(), ExecError> {
        Ok(self.nmcli.connection_up(profile).await?)
    }

    async fn deactivate(&self, profile: &str) -> Result<Deactivation, ExecError> {
        if self.nmcli.connection_down(profile).await? {
            Ok(Deactivation::Deactivated)
        } else {
            Ok(Deactivation::NotActive)
        }
    }

    async fn join(
        &self,
        interface: &str,
        ssid: &str,
        password: Option<&SecretString>,
    ) -> Result<(), ExecError> {
        Ok(self
            .nmcli
            .wifi_connect(interface, ssid, password, self.join_timeout)
            .await?)
    }

    async fn forget(&self, profile: &str) -> Result<(), ExecError> {
        Ok(self.nmcli.connection_delete(profile).await?)
    }

    async fn disconnect(&self, interface: &str) -> Result<(), ExecError> {
        Ok(self.nmcli.device_disconnect(interface).await?)
    }
}
