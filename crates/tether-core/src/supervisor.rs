// ── Supervisor ──
//
// Owns the whole connectivity stack: radio lock, hotspot controller,
// join manager, arbiter and aggregator. `start` checks the interface and
// spawns the two background loops; `shutdown` cancels and joins them.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::MONITOR_TARGET;
use crate::aggregator::{StatusAggregator, SubsystemProbe};
use crate::arbiter::Arbiter;
use crate::config::{CoreConfig, HostConfig};
use crate::error::{CoreError, ExecError};
use crate::executor::{ActiveConnection, CommandExecutor};
use crate::host::{NmcliExecutor, build_probes};
use crate::hotspot::HotspotController;
use crate::model::Snapshot;
use crate::probe::ConnectivityProbe;
use crate::radio::Radio;
use crate::store::StatusStore;
use crate::wifi::WifiConnectionManager;

/// Result of a one-off read-only pass over the host.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub interface: String,
    pub uplink: Option<ActiveConnection>,
    pub hotspot_active: bool,
    pub snapshot: Arc<Snapshot>,
}

/// Entry point for consumers.
///
/// Cheaply cloneable via `Arc<SupervisorInner>`.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    config: CoreConfig,
    executor: Arc<dyn CommandExecutor>,
    radio: Radio,
    store: Arc<StatusStore>,
    hotspot: Arc<HotspotController>,
    probe: ConnectivityProbe,
    wifi: WifiConnectionManager,
    arbiter: Arc<Arbiter>,
    aggregator: Arc<StatusAggregator>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    /// Wire the stack together. Does not touch the host; call
    /// [`start()`](Self::start) to begin supervising.
    pub fn new(
        config: CoreConfig,
        executor: Arc<dyn CommandExecutor>,
        probes: Vec<Arc<dyn SubsystemProbe>>,
    ) -> Self {
        let radio = Radio::new();
        let store = Arc::new(StatusStore::new(StatusAggregator::initial_entries(&probes)));
        let hotspot = Arc::new(HotspotController::new(
            Arc::clone(&executor),
            radio.clone(),
            config.interface.clone(),
            config.access_point.clone(),
            config.retry,
        ));
        let wifi = WifiConnectionManager::new(
            Arc::clone(&executor),
            radio.clone(),
            Arc::clone(&hotspot),
            Arc::clone(&store),
            config.interface.clone(),
            config.join,
        );
        let probe = ConnectivityProbe::new(Arc::clone(&executor), config.access_point.profile.clone());
        let arbiter = Arc::new(Arbiter::new(
            probe.clone(),
            Arc::clone(&hotspot),
            radio.clone(),
            Arc::clone(&store),
        ));
        let aggregator = Arc::new(StatusAggregator::new(
            probes,
            Arc::clone(&store),
            config.aggregator.probe_timeout,
        ));

        Self {
            inner: Arc::new(SupervisorInner {
                config,
                executor,
                radio,
                store,
                hotspot,
                probe,
                wifi,
                arbiter,
                aggregator,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Production wiring: nmcli for the radio, docker and HTTP for subsystems.
    pub fn from_host(config: CoreConfig, host: &HostConfig) -> Result<Self, CoreError> {
        config.validate()?;
        host.validate()?;
        let nmcli = tether_host::Nmcli::new(&host.nmcli, host.command_timeout);
        let executor: Arc<dyn CommandExecutor> =
            Arc::new(NmcliExecutor::new(nmcli, config.join.timeout));
        let probes = build_probes(host)?;
        Ok(Self::new(config, executor, probes))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn radio(&self) -> &Radio {
        &self.inner.radio
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.inner.store
    }

    pub fn wifi(&self) -> &WifiConnectionManager {
        &self.inner.wifi
    }

    pub fn hotspot(&self) -> &Arc<HotspotController> {
        &self.inner.hotspot
    }

    pub fn arbiter(&self) -> &Arc<Arbiter> {
        &self.inner.arbiter
    }

    pub fn aggregator(&self) -> &Arc<StatusAggregator> {
        &self.inner.aggregator
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Verify the host and spawn the arbiter and aggregator loops.
    pub async fn start(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;
        config.validate()?;
        self.check_interface().await?;

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(arbiter_task(
            Arc::clone(&self.inner.arbiter),
            config.arbiter.settle_delay,
            config.arbiter.interval,
            self.inner.cancel.child_token(),
        )));
        handles.push(tokio::spawn(aggregator_task(
            Arc::clone(&self.inner.aggregator),
            config.aggregator.interval,
            self.inner.cancel.child_token(),
        )));

        info!(
            target: MONITOR_TARGET,
            interface = %config.interface,
            hotspot = %config.access_point.ssid,
            settle_delay = ?config.arbiter.settle_delay,
            "supervisor started"
        );
        Ok(())
    }

    /// The configured interface must exist. A host that cannot answer yet
    /// is tolerated; the arbiter fails closed until it can.
    async fn check_interface(&self) -> Result<(), CoreError> {
        let interface = &self.inner.config.interface;
        match self.inner.executor.interface_state(interface).await {
            Ok(Some(state)) => {
                debug!(%interface, state = %state.state, "radio interface present");
                Ok(())
            }
            Ok(None) => Err(CoreError::Config {
                message: format!("wireless interface `{interface}` not found"),
            }),
            Err(e @ ExecError::PermissionDenied { .. }) => {
                Err(CoreError::from_exec("interface check", e))
            }
            Err(e) => {
                warn!(error = %e, %interface, "could not verify radio interface; continuing");
                Ok(())
            }
        }
    }

    /// Look without touching: uplink, hotspot state and one aggregation
    /// cycle. The radio is never taken and no mode change is published.
    pub async fn inspect(&self) -> Result<Inspection, CoreError> {
        let uplink = self
            .inner
            .probe
            .inspect()
            .await
            .map_err(|e| CoreError::from_exec("connectivity probe", e))?;
        let hotspot_active = self.inner.hotspot.refresh().await?;
        let snapshot = match self.inner.aggregator.collect().await {
            Some(snapshot) => snapshot,
            None => self.inner.store.snapshot(),
        };
        Ok(Inspection {
            interface: self.inner.config.interface.clone(),
            uplink,
            hotspot_active,
            snapshot,
        })
    }

    /// Cancel background loops and wait for them to finish.
    ///
    /// A join already underway is left to run to completion.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!(target: MONITOR_TARGET, "supervisor stopped");
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn arbiter_task(
    arbiter: Arc<Arbiter>,
    settle_delay: Duration,
    period: Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(settle_delay) => {}
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let report = arbiter.tick().await;
                debug!(path = ?report.path, outcome = ?report.outcome, "arbiter tick");
            }
        }
    }
}

async fn aggregator_task(aggregator: Arc<StatusAggregator>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                aggregator.collect().await;
            }
        }
    }
}
