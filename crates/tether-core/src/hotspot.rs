// ── Hotspot controller ──
//
// Raises and lowers the robot's own access point. Every mutation happens
// under the radio lock; `start` retries transient failures a bounded
// number of times with a fixed delay and then gives up until the next
// arbiter tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::MONITOR_TARGET;
use crate::config::{AccessPointConfig, RetryPolicy};
use crate::error::{CoreError, ExecError};
use crate::executor::{AccessPointSpec, CommandExecutor, Deactivation};
use crate::radio::{Radio, RadioGuard, RadioUser};

/// Whether a start or stop request changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotChange {
    Changed,
    /// Already in the requested state; nothing was sent to the host.
    Unchanged,
}

pub struct HotspotController {
    executor: Arc<dyn CommandExecutor>,
    radio: Radio,
    interface: String,
    access_point: AccessPointConfig,
    retry: RetryPolicy,
    active: AtomicBool,
}

impl HotspotController {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        radio: Radio,
        interface: impl Into<String>,
        access_point: AccessPointConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            executor,
            radio,
            interface: interface.into(),
            access_point,
            retry,
            active: AtomicBool::new(false),
        }
    }

    pub fn profile(&self) -> &str {
        &self.access_point.profile
    }

    /// Last known hotspot state.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Re-read the hotspot state from the host.
    pub async fn refresh(&self) -> Result<bool, CoreError> {
        let active = self
            .executor
            .active_connections()
            .await
            .map_err(|e| CoreError::from_exec("hotspot status", e))?
            .iter()
            .any(|c| c.name == self.access_point.profile);
        self.active.store(active, Ordering::SeqCst);
        Ok(active)
    }

    // ── Start ────────────────────────────────────────────────────────

    /// Bring the hotspot up. Fails fast with `RadioBusy` if another
    /// radio operation is in flight.
    pub async fn start(&self) -> Result<HotspotChange, CoreError> {
        let guard = self.radio.try_acquire(RadioUser::Hotspot)?;
        self.start_holding(&guard).await
    }

    /// Start while the caller already owns the radio.
    pub(crate) async fn start_holding(&self, _guard: &RadioGuard) -> Result<HotspotChange, CoreError> {
        if self.is_active() {
            debug!(profile = %self.access_point.profile, "hotspot already active");
            return Ok(HotspotChange::Unchanged);
        }

        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_start().await {
                Ok(()) => {
                    self.active.store(true, Ordering::SeqCst);
                    info!(
                        target: MONITOR_TARGET,
                        profile = %self.access_point.profile,
                        ssid = %self.access_point.ssid,
                        attempt,
                        "hotspot started"
                    );
                    return Ok(HotspotChange::Changed);
                }
                Err(e) if !e.is_transient() => {
                    warn!(target: MONITOR_TARGET, error = %e, "hotspot start failed permanently");
                    return Err(CoreError::from_exec("hotspot start", e));
                }
                Err(e) if attempt >= attempts => {
                    warn!(target: MONITOR_TARGET, error = %e, attempts, "hotspot start retries exhausted");
                    return Err(CoreError::RetriesExhausted {
                        operation: "hotspot start".into(),
                        attempts,
                        last: e,
                    });
                }
                Err(e) => {
                    warn!(
                        target: MONITOR_TARGET,
                        error = %e,
                        attempt,
                        attempts,
                        retry_in = ?self.retry.delay,
                        "hotspot start failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_start(&self) -> Result<(), ExecError> {
        let spec = AccessPointSpec {
            profile: self.access_point.profile.clone(),
            interface: self.interface.clone(),
            ssid: self.access_point.ssid.clone(),
            passphrase: self.access_point.passphrase.clone(),
        };
        self.executor.ensure_access_point(&spec).await?;
        self.executor.activate(&self.access_point.profile).await
    }

    // ── Stop ─────────────────────────────────────────────────────────

    /// Take the hotspot down. A single attempt; a profile that was not
    /// active counts as stopped.
    pub async fn stop(&self) -> Result<HotspotChange, CoreError> {
        let guard = self.radio.try_acquire(RadioUser::Hotspot)?;
        self.stop_holding(&guard).await
    }

    /// Stop while the caller already owns the radio.
    pub(crate) async fn stop_holding(&self, _guard: &RadioGuard) -> Result<HotspotChange, CoreError> {
        if !self.is_active() {
            debug!(profile = %self.access_point.profile, "hotspot already inactive");
            return Ok(HotspotChange::Unchanged);
        }

        let outcome = self
            .executor
            .deactivate(&self.access_point.profile)
            .await
            .map_err(|e| CoreError::from_exec("hotspot stop", e))?;
        self.active.store(false, Ordering::SeqCst);
        match outcome {
            Deactivation::Deactivated => {
                info!(target: MONITOR_TARGET, profile = %self.access_point.profile, "hotspot stopped");
                Ok(HotspotChange::Changed)
            }
            Deactivation::NotActive => {
                debug!(profile = %self.access_point.profile, "hotspot was not active on the host");
                Ok(HotspotChange::Unchanged)
            }
        }
    }
}
