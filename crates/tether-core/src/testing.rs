// Scripted host doubles for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};

use crate::aggregator::SubsystemProbe;
use crate::config::CoreConfig;
use crate::error::{CoreError, ExecError};
use crate::executor::{
    AccessPointSpec, ActiveConnection, CommandExecutor, ConnectionKind, Deactivation,
    InterfaceState, ScannedNetwork,
};
use crate::hotspot::HotspotController;
use crate::model::{ContainerStatus, Health, SubsystemKind, SubsystemStatus};
use crate::radio::Radio;
use crate::store::StatusStore;
use crate::wifi::WifiConnectionManager;

pub const INTERFACE: &str = "wlan-test";
pub const HOTSPOT_PROFILE: &str = "OM1-Hotspot";

pub fn transient(command: &str) -> ExecError {
    ExecError::Failed {
        command: command.into(),
        message: "Connection activation failed: device busy".into(),
    }
}

pub fn test_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.interface = INTERFACE.into();
    config.access_point.profile = HOTSPOT_PROFILE.into();
    config
}

pub fn controller(fake: &Arc<FakeExecutor>, radio: Radio) -> HotspotController {
    let config = test_config();
    HotspotController::new(
        fake.clone(),
        radio,
        config.interface,
        config.access_point,
        config.retry,
    )
}

// ── FakeExecutor ─────────────────────────────────────────────────────

#[derive(Default)]
struct FakeState {
    hotspot_active: bool,
    /// SSID of the client connection on the radio.
    uplink: Option<String>,
    extra: Vec<ActiveConnection>,
    interface_missing: bool,
    fail_queries: bool,
    activate_failures: VecDeque<ExecError>,
    activate_always: Option<ExecError>,
    activate_delay: Duration,
    join_delay: Duration,
    join_does_not_connect: bool,
    networks: Vec<ScannedNetwork>,
    joined: Vec<String>,
}

/// In-memory NetworkManager stand-in. One radio, one optional client
/// connection, one access-point profile.
#[derive(Default)]
pub struct FakeExecutor {
    state: Mutex<FakeState>,
    activate_calls: AtomicU32,
    deactivate_calls: AtomicU32,
    ensure_calls: AtomicU32,
    join_calls: AtomicU32,
    forget_calls: AtomicU32,
    disconnect_calls: AtomicU32,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    // ── Scripting ────────────────────────────────────────────────────

    pub fn set_hotspot_active(&self, active: bool) {
        self.with(|s| s.hotspot_active = active);
    }

    pub fn set_uplink(&self, ssid: Option<&str>) {
        self.with(|s| s.uplink = ssid.map(str::to_owned));
    }

    pub fn push_extra_connection(&self, name: &str, kind: ConnectionKind) {
        self.with(|s| {
            s.extra.push(ActiveConnection {
                name: name.into(),
                kind,
                device: Some(format!("{name}-dev")),
            });
        });
    }

    pub fn set_interface_missing(&self, missing: bool) {
        self.with(|s| s.interface_missing = missing);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.with(|s| s.fail_queries = fail);
    }

    pub fn fail_activate_times(&self, times: usize, err: ExecError) {
        self.with(|s| s.activate_failures.extend(std::iter::repeat_n(err, times)));
    }

    pub fn fail_activate_always(&self, err: ExecError) {
        self.with(|s| s.activate_always = Some(err));
    }

    pub fn clear_activate_failures(&self) {
        self.with(|s| {
            s.activate_failures.clear();
            s.activate_always = None;
        });
    }

    pub fn set_activate_delay(&self, delay: Duration) {
        self.with(|s| s.activate_delay = delay);
    }

    pub fn set_join_delay(&self, delay: Duration) {
        self.with(|s| s.join_delay = delay);
    }

    /// Make `join` report success without the link ever coming up.
    pub fn set_join_connects(&self, connects: bool) {
        self.with(|s| s.join_does_not_connect = !connects);
    }

    pub fn set_networks(&self, networks: &[(&str, u8)]) {
        self.with(|s| {
            s.networks = networks
                .iter()
                .map(|(ssid, signal)| ScannedNetwork {
                    ssid: (*ssid).into(),
                    signal: *signal,
                    security: "WPA2".into(),
                    in_use: false,
                })
                .collect();
        });
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn hotspot_active(&self) -> bool {
        self.with(|s| s.hotspot_active)
    }

    pub fn uplink(&self) -> Option<String> {
        self.with(|s| s.uplink.clone())
    }

    pub fn joined(&self) -> Vec<String> {
        self.with(|s| s.joined.clone())
    }

    pub fn activate_calls(&self) -> u32 {
        self.activate_calls.load(Ordering::SeqCst)
    }

    pub fn deactivate_calls(&self) -> u32 {
        self.deactivate_calls.load(Ordering::SeqCst)
    }

    pub fn ensure_calls(&self) -> u32 {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    pub fn join_calls(&self) -> u32 {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub fn forget_calls(&self) -> u32 {
        self.forget_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    fn query_guard(&self, command: &str) -> Result<(), ExecError> {
        if self.with(|s| s.fail_queries) {
            return Err(ExecError::Timeout {
                command: command.into(),
                timeout_secs: 15,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn active_connections(&self) -> Result<Vec<ActiveConnection>, ExecError> {
        self.query_guard("nmcli")?;
        Ok(self.with(|s| {
            let mut active = s.extra.clone();
            if s.hotspot_active {
                active.push(ActiveConnection {
                    name: HOTSPOT_PROFILE.into(),
                    kind: ConnectionKind::Wireless,
                    device: Some(INTERFACE.into()),
                });
            }
            if let Some(ssid) = &s.uplink {
                active.push(ActiveConnection {
                    name: ssid.clone(),
                    kind: ConnectionKind::Wireless,
                    device: Some(INTERFACE.into()),
                });
            }
            active
        }))
    }

    async fn interface_state(&self, interface: &str) -> Result<Option<InterfaceState>, ExecError> {
        self.query_guard("nmcli")?;
        Ok(self.with(|s| {
            if s.interface_missing {
                return None;
            }
            let connection = if s.hotspot_active {
                Some(HOTSPOT_PROFILE.to_owned())
            } else {
                s.uplink.clone()
            };
            Some(InterfaceState {
                interface: interface.into(),
                state: if connection.is_some() { "connected" } else { "disconnected" }.into(),
                connected: connection.is_some(),
                connection,
            })
        }))
    }

    async fn scan(&self, _interface: &str) -> Result<Vec<ScannedNetwork>, ExecError> {
        self.query_guard("nmcli")?;
        Ok(self.with(|s| s.networks.clone()))
    }

    async fn ensure_access_point(&self, _spec: &AccessPointSpec) -> Result<(), ExecError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn activate(&self, _profile: &str) -> Result<(), ExecError> {
        self.activate_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.with(|s| s.activate_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            if let Some(err) = s.activate_failures.pop_front().or_else(|| s.activate_always.clone()) {
                return Err(err);
            }
            s.hotspot_active = true;
            s.uplink = None;
            Ok(())
        })
    }

    async fn deactivate(&self, _profile: &str) -> Result<Deactivation, ExecError> {
        self.deactivate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.with(|s| {
            if std::mem::take(&mut s.hotspot_active) {
                Deactivation::Deactivated
            } else {
                Deactivation::NotActive
            }
        }))
    }

    async fn join(
        &self,
        _interface: &str,
        ssid: &str,
        password: Option<&SecretString>,
    ) -> Result<(), ExecError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.with(|s| s.join_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if password.is_some_and(|p| p.expose_secret().len() < 8) {
            return Err(ExecError::Failed {
                command: "nmcli".into(),
                message: "802-11-wireless-security.psk: property is invalid".into(),
            });
        }
        self.with(|s| {
            s.joined.push(ssid.to_owned());
            if !s.join_does_not_connect {
                s.hotspot_active = false;
                s.uplink = Some(ssid.to_owned());
            }
        });
        Ok(())
    }

    async fn forget(&self, _profile: &str) -> Result<(), ExecError> {
        self.forget_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self, _interface: &str) -> Result<(), ExecError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.with(|s| s.uplink = None);
        Ok(())
    }
}

// ── FakeProbe ────────────────────────────────────────────────────────

pub enum ProbeBehavior {
    Healthy,
    Fails,
    Hangs,
}

pub struct FakeProbe {
    pub name: String,
    pub behavior: ProbeBehavior,
}

impl FakeProbe {
    pub fn arc(name: &str, behavior: ProbeBehavior) -> Arc<dyn SubsystemProbe> {
        Arc::new(Self {
            name: name.into(),
            behavior,
        })
    }
}

#[async_trait]
impl SubsystemProbe for FakeProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Container
    }

    async fn poll(&self) -> Result<SubsystemStatus, CoreError> {
        match self.behavior {
            ProbeBehavior::Healthy => Ok(SubsystemStatus::Container(ContainerStatus {
                health: Health::Running,
                running: true,
                container: Some(self.name.clone()),
                state: Some("running".into()),
                started_at: None,
                detail: None,
                observed_at: Utc::now(),
            })),
            ProbeBehavior::Fails => Err(CoreError::SubsystemUnavailable {
                name: self.name.clone(),
                reason: "docker daemon not reachable".into(),
            }),
            ProbeBehavior::Hangs => std::future::pending().await,
        }
    }
}

// ── Harness ──────────────────────────────────────────────────────────

/// Fake executor wired to a hotspot controller, join manager and store.
pub struct Harness {
    pub config: CoreConfig,
    pub fake: Arc<FakeExecutor>,
    pub radio: Radio,
    pub store: Arc<StatusStore>,
    pub hotspot: Arc<HotspotController>,
    pub wifi: WifiConnectionManager,
}

impl Harness {
    pub fn new() -> Self {
        let config = test_config();
        let fake = Arc::new(FakeExecutor::new());
        let radio = Radio::new();
        let store = Arc::new(StatusStore::new(BTreeMap::new()));
        let hotspot = Arc::new(controller(&fake, radio.clone()));
        let wifi = WifiConnectionManager::new(
            fake.clone(),
            radio.clone(),
            Arc::clone(&hotspot),
            Arc::clone(&store),
            config.interface.clone(),
            config.join,
        );
        Self {
            config,
            fake,
            radio,
            store,
            hotspot,
            wifi,
        }
    }
}
