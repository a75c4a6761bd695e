// ── Domain model ──
//
// Every type here is what consumers (the HTTP surface, the CLI) read.
// All of them serialize; none of them carry secrets on the wire.

pub mod attempt;
pub mod mode;
pub mod snapshot;
pub mod subsystem;

// ── Re-exports ──────────────────────────────────────────────────────

pub use attempt::{AttemptOutcome, ConnectionAttempt};
pub use mode::{ArbiterState, NetworkMode};
pub use snapshot::{NetworkStatus, Snapshot};
pub use subsystem::{
    ContainerStatus, Health, ServiceStatus, StreamStatus, SubsystemKind, SubsystemStatus,
};
