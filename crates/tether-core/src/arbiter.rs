// ── Network mode arbiter ──
//
// One evaluation per tick: look at the host, decide between client mode
// and hotspot mode, and drive the hotspot controller to match. Ticks
// never overlap; a tick that finds the previous one still running is
// skipped outright.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::MONITOR_TARGET;
use crate::error::CoreError;
use crate::executor::ActiveConnection;
use crate::hotspot::HotspotController;
use crate::model::{ArbiterState, NetworkStatus};
use crate::probe::ConnectivityProbe;
use crate::radio::{Radio, RadioUser};
use crate::store::StatusStore;

/// How a tick ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick ran to completion in this state.
    Settled(ArbiterState),
    /// Another tick was still running.
    Skipped,
}

/// States entered during one tick, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub path: Vec<ArbiterState>,
    pub outcome: TickOutcome,
}

impl TickReport {
    pub fn settled(&self) -> Option<ArbiterState> {
        match self.outcome {
            TickOutcome::Settled(state) => Some(state),
            TickOutcome::Skipped => None,
        }
    }
}

pub struct Arbiter {
    probe: ConnectivityProbe,
    hotspot: Arc<HotspotController>,
    radio: Radio,
    store: Arc<StatusStore>,
    state: watch::Sender<ArbiterState>,
    tick_lock: Mutex<()>,
}

/// Per-tick bookkeeping.
struct Tick<'a> {
    arbiter: &'a Arbiter,
    path: Vec<ArbiterState>,
    uplink: Option<String>,
    error: Option<String>,
}

impl Tick<'_> {
    fn enter(&mut self, state: ArbiterState) {
        let previous = self.arbiter.state.send_replace(state);
        let previous_mode = self.arbiter.store.network().mode;
        self.path.push(state);
        let status = self.arbiter.store.publish_state(
            state,
            self.uplink.clone(),
            self.arbiter.hotspot.is_active(),
            self.error.clone(),
        );
        if previous != state {
            debug!(from = %previous, to = %state, "arbiter transition");
        }
        if state.is_settled() && status.mode != previous_mode {
            log_mode(&status);
        }
    }

    fn finish(mut self, state: ArbiterState) -> TickReport {
        self.enter(state);
        TickReport {
            path: self.path,
            outcome: TickOutcome::Settled(state),
        }
    }

    fn fail(mut self, state: ArbiterState, err: &CoreError) -> TickReport {
        self.error = Some(err.to_string());
        self.finish(state)
    }
}

fn log_mode(status: &NetworkStatus) {
    info!(
        target: MONITOR_TARGET,
        mode = %status.mode,
        uplink = status.uplink.as_deref().unwrap_or("-"),
        hotspot_active = status.hotspot_active,
        "network mode changed"
    );
}

impl Arbiter {
    pub fn new(
        probe: ConnectivityProbe,
        hotspot: Arc<HotspotController>,
        radio: Radio,
        store: Arc<StatusStore>,
    ) -> Self {
        let (state, _) = watch::channel(ArbiterState::Unknown);
        Self {
            probe,
            hotspot,
            radio,
            store,
            state,
            tick_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> ArbiterState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ArbiterState> {
        self.state.subscribe()
    }

    /// Run one evaluation.
    pub async fn tick(&self) -> TickReport {
        let Ok(_running) = self.tick_lock.try_lock() else {
            debug!("previous arbiter tick still running; skipping");
            return TickReport {
                path: Vec::new(),
                outcome: TickOutcome::Skipped,
            };
        };

        let mut tick = Tick {
            arbiter: self,
            path: Vec::new(),
            uplink: self.store.network().uplink.clone(),
            error: None,
        };

        // A pending join owns the radio's future; leave it be.
        let joining = self.store.attempt().is_some_and(|a| a.is_pending())
            || self.radio.holder() == Some(RadioUser::Join);
        if joining {
            return tick.finish(ArbiterState::ConnectingToNetwork);
        }

        tick.enter(ArbiterState::CheckingConnectivity);
        if let Err(e) = self.hotspot.refresh().await {
            debug!(error = %e, "hotspot state refresh failed; using last known state");
        }
        let uplink = self.probe.uplink().await;
        tick.uplink = uplink.as_ref().map(|c| c.name.clone());

        match (uplink, self.hotspot.is_active()) {
            (Some(_), false) => tick.finish(ArbiterState::ClientConnected),
            (None, true) => tick.finish(ArbiterState::HotspotActive),
            (Some(uplink), true) => self.leave_hotspot(tick, &uplink).await,
            (None, false) => self.raise_hotspot(tick).await,
        }
    }

    async fn raise_hotspot(&self, mut tick: Tick<'_>) -> TickReport {
        tick.enter(ArbiterState::StartingHotspot);
        match self.hotspot.start().await {
            Ok(_) => tick.finish(ArbiterState::HotspotActive),
            Err(e) => self.after_failure(tick, &e),
        }
    }

    async fn leave_hotspot(&self, mut tick: Tick<'_>, uplink: &ActiveConnection) -> TickReport {
        info!(target: MONITOR_TARGET, uplink = %uplink.name, "uplink available; stopping hotspot");
        tick.enter(ArbiterState::StoppingHotspot);
        if let Err(e) = self.hotspot.stop().await {
            return self.after_failure(tick, &e);
        }

        tick.enter(ArbiterState::CheckingConnectivity);
        let uplink = self.probe.uplink().await;
        tick.uplink = uplink.as_ref().map(|c| c.name.clone());
        if uplink.is_some() {
            tick.finish(ArbiterState::ClientConnected)
        } else {
            // Next tick raises the hotspot again.
            warn!(target: MONITOR_TARGET, "uplink vanished after stopping hotspot");
            tick.finish(ArbiterState::Unknown)
        }
    }

    fn after_failure(&self, tick: Tick<'_>, err: &CoreError) -> TickReport {
        if err.is_radio_busy() {
            let state = if self.radio.holder() == Some(RadioUser::Join) {
                ArbiterState::ConnectingToNetwork
            } else {
                ArbiterState::Unknown
            };
            debug!(error = %err, "radio busy; deferring to next tick");
            return tick.finish(state);
        }
        error!(target: MONITOR_TARGET, error = %err, "hotspot transition failed");
        tick.fail(ArbiterState::Unknown, err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NetworkMode;
    use pretty_assertions::assert_eq;
    use crate::testing::{Harness, HOTSPOT_PROFILE, transient};
    use crate::executor::ConnectionKind;
    use secrecy::SecretString;
    use std::time::Duration;

    fn build_arbiter(h: &Harness) -> Arc<Arbiter> {
        Arc::new(Arbiter::new(
            ConnectivityProbe::new(h.fake.clone(), HOTSPOT_PROFILE),
            Arc::clone(&h.hotspot),
            h.radio.clone(),
            Arc::clone(&h.store),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn boot_without_uplink_raises_hotspot() {
        let h = Harness::new();
        let arbiter = build_arbiter(&h);

        let report = arbiter.tick().await;
        assert_eq!(
            report.path,
            vec![
                ArbiterState::CheckingConnectivity,
                ArbiterState::StartingHotspot,
                ArbiterState::HotspotActive,
            ]
        );
        assert!(h.fake.hotspot_active());
        assert_eq!(h.store.network().mode, NetworkMode::HotspotActive);
        assert_eq!(arbiter.state(), ArbiterState::HotspotActive);
    }

    #[tokio::test(start_paused = true)]
    async fn uplink_appearing_stops_hotspot() {
        let h = Harness::new();
        let arbiter = build_arbiter(&h);
        arbiter.tick().await;

        h.fake.push_extra_connection("Wired connection 1", ConnectionKind::Ethernet);
        let report = arbiter.tick().await;
        assert_eq!(
            report.path,
            vec![
                ArbiterState::CheckingConnectivity,
                ArbiterState::StoppingHotspot,
                ArbiterState::CheckingConnectivity,
                ArbiterState::ClientConnected,
            ]
        );
        assert!(!h.fake.hotspot_active());
        let network = h.store.network();
        assert_eq!(network.mode, NetworkMode::ClientConnected);
        assert_eq!(network.uplink.as_deref(), Some("Wired connection 1"));
        assert!(!network.hotspot_active);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_states_do_not_touch_the_radio() {
        let h = Harness::new();
        let arbiter = build_arbiter(&h);
        arbiter.tick().await;
        arbiter.tick().await;
        assert_eq!(h.fake.activate_calls(), 1);
        assert_eq!(arbiter.tick().await.settled(), Some(ArbiterState::HotspotActive));

        let h = Harness::new();
        h.fake.set_uplink(Some("HomeNet"));
        let arbiter = build_arbiter(&h);
        assert_eq!(arbiter.tick().await.settled(), Some(ArbiterState::ClientConnected));
        assert_eq!(h.fake.activate_calls(), 0);
        assert_eq!(h.fake.deactivate_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_settles_unknown_then_recovers() {
        let h = Harness::new();
        h.fake.fail_activate_always(transient("activate"));
        let arbiter = build_arbiter(&h);

        let report = arbiter.tick().await;
        assert_eq!(report.settled(), Some(ArbiterState::Unknown));
        assert_eq!(h.fake.activate_calls(), 3);
        let network = h.store.network();
        assert_eq!(network.mode, NetworkMode::Unknown);
        assert!(network.last_error.is_some());

        h.fake.clear_activate_failures();
        assert_eq!(arbiter.tick().await.settled(), Some(ArbiterState::HotspotActive));
        assert!(h.store.network().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_tick_is_skipped() {
        let h = Harness::new();
        h.fake.set_activate_delay(Duration::from_secs(3));
        let arbiter = build_arbiter(&h);

        let first = {
            let arbiter = Arc::clone(&arbiter);
            tokio::spawn(async move { arbiter.tick().await })
        };
        tokio::task::yield_now().await;

        let second = arbiter.tick().await;
        assert_eq!(second.outcome, TickOutcome::Skipped);
        assert!(second.path.is_empty());

        let first = first.await.unwrap();
        assert_eq!(first.settled(), Some(ArbiterState::HotspotActive));
        assert_eq!(h.fake.activate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_join_reports_connecting() {
        let h = Harness::new();
        let arbiter = build_arbiter(&h);
        arbiter.tick().await;

        let (_, task) = h.wifi.submit("HomeNet", Some(SecretString::from("hunter222"))).unwrap();
        let report = arbiter.tick().await;
        assert_eq!(report.path, vec![ArbiterState::ConnectingToNetwork]);
        assert_eq!(h.store.network().mode, NetworkMode::Transitioning);

        task.await.unwrap();
        assert_eq!(arbiter.tick().await.settled(), Some(ArbiterState::ClientConnected));
        assert_eq!(h.store.network().mode, NetworkMode::ClientConnected);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_join_falls_back_to_hotspot() {
        let h = Harness::new();
        let arbiter = build_arbiter(&h);
        arbiter.tick().await;

        let (_, task) = h.wifi.submit("HomeNet", Some(SecretString::from("short"))).unwrap();
        task.await.unwrap();
        assert!(!h.fake.hotspot_active());

        let report = arbiter.tick().await;
        assert_eq!(report.settled(), Some(ArbiterState::HotspotActive));
        assert!(h.fake.hotspot_active());
    }

    #[tokio::test(start_paused = true)]
    async fn hotspot_and_client_never_both_reported() {
        let h = Harness::new();
        let arbiter = build_arbiter(&h);
        let mut rx = arbiter.subscribe();
        arbiter.tick().await;
        h.fake.push_extra_connection("Wired connection 1", ConnectionKind::Ethernet);
        arbiter.tick().await;

        let network = h.store.network();
        assert!(!(network.hotspot_active && network.mode == NetworkMode::ClientConnected));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ArbiterState::ClientConnected);
    }
}
