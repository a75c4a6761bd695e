// ── Upstream connectivity probe ──
//
// Answers one question: is there an upstream link other than our own
// hotspot? Any failure to find out counts as "no", so the arbiter falls
// back to serving the access point.

use std::sync::Arc;

use tracing::warn;

use crate::error::ExecError;
use crate::executor::{ActiveConnection, CommandExecutor, ConnectionKind};

#[derive(Clone)]
pub struct ConnectivityProbe {
    executor: Arc<dyn CommandExecutor>,
    hotspot_profile: String,
}

impl ConnectivityProbe {
    pub fn new(executor: Arc<dyn CommandExecutor>, hotspot_profile: impl Into<String>) -> Self {
        Self {
            executor,
            hotspot_profile: hotspot_profile.into(),
        }
    }

    /// The upstream connection, if one exists. Errors are propagated.
    pub async fn inspect(&self) -> Result<Option<ActiveConnection>, ExecError> {
        let active = self.executor.active_connections().await?;
        Ok(active.into_iter().find(|c| self.is_uplink(c)))
    }

    /// Like [`inspect`](Self::inspect), but a failed query reads as no uplink.
    pub async fn uplink(&self) -> Option<ActiveConnection> {
        match self.inspect().await {
            Ok(uplink) => uplink,
            Err(e) => {
                warn!(error = %e, "connectivity check failed; assuming no uplink");
                None
            }
        }
    }

    pub async fn check(&self) -> bool {
        self.uplink().await.is_some()
    }

    fn is_uplink(&self, conn: &ActiveConnection) -> bool {
        matches!(conn.kind, ConnectionKind::Wireless | ConnectionKind::Ethernet)
            && conn.name != self.hotspot_profile
            && conn.device.is_some()
    }
}
