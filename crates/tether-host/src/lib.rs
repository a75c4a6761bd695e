// tether-host: Async clients for the host network manager, container runtime,
// and robot service endpoints.

pub mod docker;
pub mod error;
pub mod models;
pub mod nmcli;
pub mod runner;
pub mod services;

pub use docker::Docker;
pub use error::Error;
pub use models::{
    AccessPointProfile, ActiveConnectionEntry, ContainerState, DeviceStatus, RobotStatus,
    SupervisorProgram, WifiListEntry,
};
pub use nmcli::Nmcli;
pub use runner::{CommandOutput, CommandRunner};
pub use services::ServiceClient;
