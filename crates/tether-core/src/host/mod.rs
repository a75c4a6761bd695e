// ── Host adapters ──
//
// Production implementations of the core seams, backed by tether-host:
// `NmcliExecutor` for the radio, and one `SubsystemProbe` per configured
// container, stream and the robot orchestrator.

mod network;
mod subsystems;

use std::sync::Arc;

pub use network::NmcliExecutor;
pub use subsystems::{ContainerProbe, ServiceProbe, StreamProbe};

use crate::aggregator::SubsystemProbe;
use crate::config::HostConfig;
use crate::error::CoreError;

/// Snapshot key of the orchestrator service entry.
pub const SERVICES_SUBSYSTEM: &str = "robot_services";

/// Build every probe named by the host configuration.
pub fn build_probes(host: &HostConfig) -> Result<Vec<Arc<dyn SubsystemProbe>>, CoreError> {
    let docker = tether_host::Docker::new(&host.docker, host.command_timeout);
    let services = tether_host::ServiceClient::new(&host.orchestrator_url, host.command_timeout)
        .map_err(|e| CoreError::Config {
            message: format!("orchestrator_url: {e}"),
        })?;

    let mut probes: Vec<Arc<dyn SubsystemProbe>> = Vec::new();
    for spec in &host.containers {
        probes.push(Arc::new(ContainerProbe::new(spec.clone(), docker.clone())));
    }
    for spec in &host.streams {
        probes.push(Arc::new(StreamProbe::new(spec.clone(), docker.clone())));
    }
    probes.push(Arc::new(ServiceProbe::new(SERVICES_SUBSYSTEM, services)));
    Ok(probes)
}
