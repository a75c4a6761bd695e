// ── WiFi connection manager ──
//
// Accepts join requests without blocking the caller. The join itself
// runs on a background task: wait out the hand-off delay, take the
// radio, drop the hotspot, join, verify, and clean up on failure. A
// newer request supersedes an older one that has not reached the radio.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::MONITOR_TARGET;
use crate::config::{JoinTiming, validate_ssid};
use crate::error::CoreError;
use crate::executor::{CommandExecutor, ScannedNetwork};
use crate::hotspot::HotspotController;
use crate::model::{AttemptOutcome, ConnectionAttempt};
use crate::radio::{Radio, RadioGuard, RadioUser};
use crate::store::StatusStore;

/// Steps a client on the hotspot should follow after a join is accepted.
pub const JOIN_INSTRUCTIONS: [&str; 4] = [
    "The robot will leave its hotspot in a few seconds.",
    "Reconnect this device to the network the robot is joining.",
    "Find the robot on that network to confirm it joined.",
    "If the join fails the robot brings its hotspot back up.",
];

/// Response to an accepted join request.
#[derive(Debug, Clone, Serialize)]
pub struct JoinAccepted {
    pub attempt_id: u64,
    pub ssid: String,
    pub message: String,
    pub instructions: &'static [&'static str],
}

/// Outcome of a disconnect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DisconnectOutcome {
    Disconnected { connection: String },
    /// Nothing but the hotspot (or nothing at all) was on the interface.
    NotConnected,
}

#[derive(Clone)]
pub struct WifiConnectionManager {
    inner: Arc<WifiInner>,
}

struct WifiInner {
    executor: Arc<dyn CommandExecutor>,
    radio: Radio,
    hotspot: Arc<HotspotController>,
    store: Arc<StatusStore>,
    interface: String,
    timing: JoinTiming,
    generation: AtomicU64,
}

impl WifiConnectionManager {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        radio: Radio,
        hotspot: Arc<HotspotController>,
        store: Arc<StatusStore>,
        interface: impl Into<String>,
        timing: JoinTiming,
    ) -> Self {
        Self {
            inner: Arc::new(WifiInner {
                executor,
                radio,
                hotspot,
                store,
                interface: interface.into(),
                timing,
                generation: AtomicU64::new(0),
            }),
        }
    }

    // ── Join ─────────────────────────────────────────────────────────

    /// Validate and accept a join request, returning immediately.
    ///
    /// Only structural checks happen here. Whether the password is right
    /// is learned later and reported through the attempt's outcome.
    pub fn request_connect(
        &self,
        ssid: &str,
        password: Option<SecretString>,
    ) -> Result<JoinAccepted, CoreError> {
        self.submit(ssid, password).map(|(accepted, _)| accepted)
    }

    /// Like [`request_connect`](Self::request_connect), also returning the
    /// background task.
    pub fn submit(
        &self,
        ssid: &str,
        password: Option<SecretString>,
    ) -> Result<(JoinAccepted, JoinHandle<()>), CoreError> {
        validate_ssid(ssid)?;
        let ssid = ssid.trim().to_owned();
        let password = password.filter(|p| !p.expose_secret().is_empty());

        match self.inner.radio.holder() {
            Some(holder @ (RadioUser::Hotspot | RadioUser::Disconnect)) => {
                return Err(CoreError::RadioBusy {
                    holder: Some(holder),
                });
            }
            Some(RadioUser::Join) | None => {}
        }

        let id = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.inner.store.attempt().filter(|a| a.is_pending()) {
            info!(target: MONITOR_TARGET, superseded = previous.id, ssid = %previous.ssid, "join request superseded");
        }
        self.inner
            .store
            .begin_attempt(ConnectionAttempt::pending(id, ssid.clone(), password.clone()));
        self.inner.store.mark_connecting();
        info!(target: MONITOR_TARGET, attempt = id, %ssid, "join request accepted");

        let inner = Arc::clone(&self.inner);
        let task_ssid = ssid.clone();
        let handle = tokio::spawn(async move { inner.run_join(id, task_ssid, password).await });

        Ok((
            JoinAccepted {
                attempt_id: id,
                message: format!("Connecting to {ssid}"),
                ssid,
                instructions: &JOIN_INSTRUCTIONS,
            },
            handle,
        ))
    }

    pub fn current_attempt(&self) -> Option<Arc<ConnectionAttempt>> {
        self.inner.store.attempt()
    }

    // ── Scan / disconnect ────────────────────────────────────────────

    /// Visible networks, strongest first. A failed scan yields an empty list.
    pub async fn scan(&self) -> Vec<ScannedNetwork> {
        match self.inner.executor.scan(&self.inner.interface).await {
            Ok(networks) => networks,
            Err(e) => {
                warn!(error = %e, interface = %self.inner.interface, "wifi scan failed");
                Vec::new()
            }
        }
    }

    /// Drop the current client connection. The hotspot is left alone; the
    /// arbiter brings it up on its next tick if nothing else is connected.
    pub async fn disconnect(&self) -> Result<DisconnectOutcome, CoreError> {
        let _guard = self.inner.radio.try_acquire(RadioUser::Disconnect)?;
        let state = self
            .inner
            .executor
            .interface_state(&self.inner.interface)
            .await
            .map_err(|e| CoreError::from_exec("interface status", e))?;

        let connection = state
            .filter(|s| s.connected)
            .and_then(|s| s.connection)
            .filter(|c| c != self.inner.hotspot.profile());
        let Some(connection) = connection else {
            return Ok(DisconnectOutcome::NotConnected);
        };

        self.inner
            .executor
            .disconnect(&self.inner.interface)
            .await
            .map_err(|e| CoreError::from_exec("disconnect", e))?;
        info!(target: MONITOR_TARGET, %connection, "client network disconnected");
        Ok(DisconnectOutcome::Disconnected { connection })
    }
}

impl WifiInner {
    fn superseded(&self, id: u64) -> bool {
        !self.store.is_current_attempt(id)
    }

    async fn run_join(&self, id: u64, ssid: String, password: Option<SecretString>) {
        tokio::time::sleep(self.timing.handoff_delay).await;
        if self.superseded(id) {
            debug!(attempt = id, %ssid, "join superseded before radio hand-off");
            return;
        }

        let guard = self.radio.acquire(RadioUser::Join).await;
        if self.superseded(id) {
            debug!(attempt = id, %ssid, "join superseded while waiting for the radio");
            return;
        }

        info!(target: MONITOR_TARGET, attempt = id, %ssid, "joining network");
        match self.join(&guard, &ssid, password.as_ref()).await {
            Ok(()) => {
                info!(target: MONITOR_TARGET, attempt = id, %ssid, "joined network");
                self.store.finish_attempt(id, AttemptOutcome::Succeeded, None);
            }
            Err(reason) => {
                warn!(target: MONITOR_TARGET, attempt = id, %ssid, %reason, "join failed");
                if let Err(e) = self.executor.forget(&ssid).await {
                    debug!(error = %e, %ssid, "no profile to remove after failed join");
                }
                self.store
                    .finish_attempt(id, AttemptOutcome::Failed, Some(reason));
            }
        }
        drop(guard);
    }

    async fn join(
        &self,
        guard: &RadioGuard,
        ssid: &str,
        password: Option<&SecretString>,
    ) -> Result<(), String> {
        // The cached flag is only as fresh as the last arbiter tick; an
        // access point that autoconnected at boot is not in it yet.
        if let Err(e) = self.hotspot.refresh().await {
            debug!(error = %e, "could not read hotspot state before join");
        }
        if let Err(e) = self.hotspot.stop_holding(guard).await {
            warn!(error = %e, "could not stop hotspot before join");
        }

        let join = self.executor.join(&self.interface, ssid, password);
        match tokio::time::timeout(self.timing.timeout, join).await {
            Err(_) => {
                return Err(format!(
                    "join timed out after {}s",
                    self.timing.timeout.as_secs()
                ));
            }
            Ok(Err(e)) => return Err(e.to_string()),
            Ok(Ok(())) => {}
        }

        tokio::time::sleep(self.timing.verify_delay).await;
        match self.executor.interface_state(&self.interface).await {
            Ok(Some(state)) if state.connected && connection_matches(state.connection.as_deref(), ssid) => {
                Ok(())
            }
            Ok(_) => Err(format!("not connected to {ssid} after join")),
            Err(e) => Err(format!("could not verify connection: {e}")),
        }
    }
}

/// NetworkManager names a new profile after the SSID, suffixing a number
/// when the name is taken.
fn connection_matches(connection: Option<&str>, ssid: &str) -> bool {
    connection.is_some_and(|c| {
        c == ssid
            || c.strip_prefix(ssid)
                .and_then(|rest| rest.strip_prefix(' '))
                .is_some_and(|n| n.chars().all(|ch| ch.is_ascii_digit()))
    })
}
