// ── Status aggregator ──
//
// Polls every subsystem probe concurrently, each under its own deadline,
// and publishes the combined result as one immutable snapshot. A probe
// that errors or hangs costs exactly one `unavailable` entry; it never
// delays or drops the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::CoreError;
use crate::model::{Health, Snapshot, SubsystemKind, SubsystemStatus};
use crate::store::StatusStore;

/// One monitored subsystem.
#[async_trait]
pub trait SubsystemProbe: Send + Sync {
    /// Key in the snapshot. Unique across probes.
    fn name(&self) -> &str;

    fn kind(&self) -> SubsystemKind;

    async fn poll(&self) -> Result<SubsystemStatus, CoreError>;
}

pub struct StatusAggregator {
    probes: Vec<Arc<dyn SubsystemProbe>>,
    store: Arc<StatusStore>,
    probe_timeout: Duration,
    sequence: AtomicU64,
    cycle_lock: Mutex<()>,
}

impl StatusAggregator {
    pub fn new(
        probes: Vec<Arc<dyn SubsystemProbe>>,
        store: Arc<StatusStore>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            probes,
            store,
            probe_timeout,
            sequence: AtomicU64::new(0),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Placeholder entries for every probe, used to seed the store.
    pub fn initial_entries(probes: &[Arc<dyn SubsystemProbe>]) -> BTreeMap<String, SubsystemStatus> {
        let now = Utc::now();
        probes
            .iter()
            .map(|p| {
                (
                    p.name().to_owned(),
                    SubsystemStatus::unknown(p.kind(), "not yet polled", now),
                )
            })
            .collect()
    }

    pub fn probe_names(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(|p| p.name())
    }

    /// Run one cycle and publish its snapshot.
    ///
    /// Returns `None` if the previous cycle is still running.
    pub async fn collect(&self) -> Option<Arc<Snapshot>> {
        let Ok(_running) = self.cycle_lock.try_lock() else {
            debug!("previous aggregation cycle still running; skipping");
            return None;
        };

        let results = join_all(self.probes.iter().map(|probe| self.poll_one(probe.as_ref()))).await;
        let subsystems: BTreeMap<String, SubsystemStatus> = results.into_iter().collect();

        let degraded = subsystems
            .values()
            .filter(|s| s.health() != Health::Running)
            .count();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(sequence, subsystems = subsystems.len(), degraded, "snapshot built");

        let snapshot = Snapshot::new(
            sequence,
            (*self.store.network()).clone(),
            self.store.attempt(),
            subsystems,
        );
        Some(self.store.publish_snapshot(snapshot))
    }

    async fn poll_one(&self, probe: &dyn SubsystemProbe) -> (String, SubsystemStatus) {
        let name = probe.name().to_owned();
        let status = match tokio::time::timeout(self.probe_timeout, probe.poll()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                debug!(subsystem = %name, error = %e, "probe failed");
                SubsystemStatus::unavailable(probe.kind(), e.to_string(), Utc::now())
            }
            Err(_) => {
                debug!(subsystem = %name, timeout = ?self.probe_timeout, "probe timed out");
                SubsystemStatus::unavailable(
                    probe.kind(),
                    format!("probe timed out after {}s", self.probe_timeout.as_secs()),
                    Utc::now(),
                )
            }
        };
        (name, status)
    }
}
