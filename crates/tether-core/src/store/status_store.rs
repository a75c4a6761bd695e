use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::Utc;

use crate::model::{
    ArbiterState, AttemptOutcome, ConnectionAttempt, NetworkStatus, Snapshot, SubsystemStatus,
};

/// Lock-free holder of the latest network status, join attempt and snapshot.
pub struct StatusStore {
    network: ArcSwap<NetworkStatus>,
    attempt: ArcSwapOption<ConnectionAttempt>,
    snapshot: ArcSwap<Snapshot>,
}

impl StatusStore {
    /// Seed the store with a sequence-0 snapshot that already lists every
    /// subsystem that will be monitored.
    pub fn new(initial: BTreeMap<String, SubsystemStatus>) -> Self {
        let network = NetworkStatus::default();
        let snapshot = Snapshot::new(0, network.clone(), None, initial);
        Self {
            network: ArcSwap::from_pointee(network),
            attempt: ArcSwapOption::empty(),
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    // ── Readers ──────────────────────────────────────────────────────

    pub fn network(&self) -> Arc<NetworkStatus> {
        self.network.load_full()
    }

    pub fn attempt(&self) -> Option<Arc<ConnectionAttempt>> {
        self.attempt.load_full()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    // ── Network status ───────────────────────────────────────────────

    /// Publish an arbiter state. `changed_at` moves only when the mode does.
    pub(crate) fn publish_state(
        &self,
        state: ArbiterState,
        uplink: Option<String>,
        hotspot_active: bool,
        last_error: Option<String>,
    ) -> Arc<NetworkStatus> {
        self.network.rcu(|current| {
            let mode = state.mode().unwrap_or(current.mode);
            NetworkStatus {
                mode,
                state,
                uplink: uplink.clone(),
                hotspot_active,
                changed_at: if mode == current.mode {
                    current.changed_at
                } else {
                    Utc::now()
                },
                last_error: last_error.clone(),
            }
        });
        self.network()
    }

    /// Mark a join as underway without waiting for the next arbiter tick.
    pub(crate) fn mark_connecting(&self) {
        let current = self.network();
        self.publish_state(
            ArbiterState::ConnectingToNetwork,
            current.uplink.clone(),
            current.hotspot_active,
            None,
        );
    }

    // ── Join attempts ────────────────────────────────────────────────

    /// Replace the current attempt. A pending predecessor stops being
    /// tracked; its join task notices and bows out.
    pub(crate) fn begin_attempt(&self, attempt: ConnectionAttempt) {
        self.attempt.store(Some(Arc::new(attempt)));
    }

    /// Finish attempt `id`. Returns `false` if a newer attempt replaced it.
    pub(crate) fn finish_attempt(
        &self,
        id: u64,
        outcome: AttemptOutcome,
        reason: Option<String>,
    ) -> bool {
        let mut finished = false;
        self.attempt.rcu(|current| match current {
            Some(attempt) if attempt.id == id => {
                finished = true;
                Some(Arc::new(attempt.finished(outcome, reason.clone())))
            }
            other => {
                finished = false;
                other.clone()
            }
        });
        finished
    }

    /// Whether attempt `id` is still the current, pending one.
    pub(crate) fn is_current_attempt(&self, id: u64) -> bool {
        self.attempt
            .load_full()
            .is_some_and(|a| a.id == id && a.is_pending())
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Swap in a fully built snapshot.
    pub(crate) fn publish_snapshot(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.snapshot.store(Arc::clone(&snapshot));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NetworkMode, SubsystemKind};
    use pretty_assertions::assert_eq;

    fn store() -> StatusStore {
        let mut initial = BTreeMap::new();
        initial.insert(
            "sensor".to_owned(),
            SubsystemStatus::unknown(SubsystemKind::Container, "not yet polled", Utc::now()),
        );
        StatusStore::new(initial)
    }

    #[test]
    fn initial_snapshot_lists_every_subsystem() {
        let store = store();
        let snap = store.snapshot();
        assert_eq!(snap.sequence, 0);
        assert!(snap.subsystems.contains_key("sensor"));
        assert_eq!(snap.network.mode, NetworkMode::Unknown);
    }

    #[test]
    fn checking_state_keeps_mode_and_timestamp() {
        let store = store();
        let first = store.publish_state(ArbiterState::HotspotActive, None, true, None);
        assert_eq!(first.mode, NetworkMode::HotspotActive);

        let checking = store.publish_state(ArbiterState::CheckingConnectivity, None, true, None);
        assert_eq!(checking.mode, NetworkMode::HotspotActive);
        assert_eq!(checking.state, ArbiterState::CheckingConnectivity);
        assert_eq!(checking.changed_at, first.changed_at);
    }

    #[test]
    fn stale_finish_does_not_overwrite_newer_attempt() {
        let store = store();
        store.begin_attempt(ConnectionAttempt::pending(1, "Old".into(), None));
        store.begin_attempt(ConnectionAttempt::pending(2, "New".into(), None));

        assert!(!store.finish_attempt(1, AttemptOutcome::Failed, Some("late".into())));
        let current = store.attempt().unwrap_or_else(|| panic!("attempt missing"));
        assert_eq!(current.id, 2);
        assert!(current.is_pending());

        assert!(store.finish_attempt(2, AttemptOutcome::Succeeded, None));
        assert!(!store.is_current_attempt(2));
    }

    #[test]
    fn readers_keep_their_snapshot_across_swaps() {
        let store = store();
        let before = store.snapshot();

        store.publish_snapshot(Snapshot::new(1, NetworkStatus::default(), None, BTreeMap::new()));

        assert_eq!(before.sequence, 0);
        assert!(before.subsystems.contains_key("sensor"));
        assert_eq!(store.snapshot().sequence, 1);
    }
}
