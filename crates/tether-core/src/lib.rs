// tether-core: Connectivity arbitration and status aggregation between
// tether-host and consumers (HTTP API, CLI).

pub mod aggregator;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod hotspot;
pub mod model;
pub mod probe;
pub mod radio;
pub mod store;
pub mod supervisor;
pub mod wifi;

#[cfg(test)]
mod testing;

/// Tracing target for connectivity events worth keeping on a device:
/// mode changes, hotspot transitions and join outcomes.
pub const MONITOR_TARGET: &str = "tether::monitor";

// ── Primary re-exports ──────────────────────────────────────────────
pub use aggregator::{StatusAggregator, SubsystemProbe};
pub use arbiter::{Arbiter, TickOutcome, TickReport};
pub use config::{
    AccessPointConfig, AggregatorTiming, ArbiterTiming, ContainerSpec, CoreConfig, HostConfig,
    JoinTiming, MediaKind, RetryPolicy, STALE_SLACK, StreamSpec,
};
pub use error::{CoreError, ExecError};
pub use executor::{CommandExecutor, ScannedNetwork};
pub use hotspot::{HotspotChange, HotspotController};
pub use radio::{Radio, RadioUser};
pub use store::StatusStore;
pub use supervisor::{Inspection, Supervisor};
pub use wifi::{DisconnectOutcome, JoinAccepted, WifiConnectionManager};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ArbiterState, AttemptOutcome, ConnectionAttempt, ContainerStatus, Health, NetworkMode,
    NetworkStatus, ServiceStatus, Snapshot, StreamStatus, SubsystemKind, SubsystemStatus,
};
