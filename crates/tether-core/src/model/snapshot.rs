use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::attempt::ConnectionAttempt;
use super::mode::{ArbiterState, NetworkMode};
use super::subsystem::{SubsystemKind, SubsystemStatus};

/// What the arbiter last published about the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub mode: NetworkMode,
    pub state: ArbiterState,
    /// Active upstream connection, when one exists.
    pub uplink: Option<String>,
    pub hotspot_active: bool,
    /// When `mode` last changed.
    pub changed_at: DateTime<Utc>,
    /// Failure from the latest arbiter tick, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self {
            mode: NetworkMode::Unknown,
            state: ArbiterState::Unknown,
            uplink: None,
            hotspot_active: false,
            changed_at: Utc::now(),
            last_error: None,
        }
    }
}

/// Point-in-time view of the whole system.
///
/// Immutable once built; replaced as a whole so readers never observe a
/// partially updated view.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Monotonic per-process counter; 0 before the first aggregation.
    pub sequence: u64,
    pub generated_at: DateTime<Utc>,
    pub network: NetworkStatus,
    pub attempt: Option<Arc<ConnectionAttempt>>,
    pub subsystems: BTreeMap<String, SubsystemStatus>,
}

impl Snapshot {
    pub fn new(
        sequence: u64,
        network: NetworkStatus,
        attempt: Option<Arc<ConnectionAttempt>>,
        subsystems: BTreeMap<String, SubsystemStatus>,
    ) -> Self {
        Self {
            sequence,
            generated_at: Utc::now(),
            network,
            attempt,
            subsystems,
        }
    }

    /// Subsystems of one kind, keyed by name.
    pub fn of_kind(&self, kind: SubsystemKind) -> BTreeMap<&str, &SubsystemStatus> {
        self.subsystems
            .iter()
            .filter(|(_, s)| s.kind() == kind)
            .map(|(name, s)| (name.as_str(), s))
            .collect()
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.generated_at
    }

    /// Older than `max_age`; readers surface this rather than hide it.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: TimeDelta) -> bool {
        self.age(now) > max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Health;

    fn entry(kind: SubsystemKind) -> SubsystemStatus {
        SubsystemStatus::unknown(kind, "not yet polled", Utc::now())
    }

    #[test]
    fn of_kind_filters_by_kind() {
        let mut subsystems = BTreeMap::new();
        subsystems.insert("sensor".to_owned(), entry(SubsystemKind::Container));
        subsystems.insert("mic_local".to_owned(), entry(SubsystemKind::Stream));
        subsystems.insert("robot".to_owned(), entry(SubsystemKind::Service));
        let snap = Snapshot::new(3, NetworkStatus::default(), None, subsystems);

        let streams = snap.of_kind(SubsystemKind::Stream);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams["mic_local"].health(), Health::Unknown);
    }

    #[test]
    fn staleness_is_relative_to_generation_time() {
        let snap = Snapshot::new(1, NetworkStatus::default(), None, BTreeMap::new());
        let later = snap.generated_at + TimeDelta::seconds(30);
        assert!(snap.is_stale(later, TimeDelta::seconds(15)));
        assert!(!snap.is_stale(snap.generated_at, TimeDelta::seconds(15)));
    }
}
