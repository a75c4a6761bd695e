use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Externally visible connectivity mode.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NetworkMode {
    #[default]
    Unknown,
    /// An upstream link exists; the hotspot is down.
    ClientConnected,
    /// No upstream link; the robot is serving its own access point.
    HotspotActive,
    /// A radio operation is in flight.
    Transitioning,
}

/// Arbiter state machine position.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArbiterState {
    #[default]
    Unknown,
    CheckingConnectivity,
    ClientConnected,
    StartingHotspot,
    HotspotActive,
    StoppingHotspot,
    ConnectingToNetwork,
}

impl ArbiterState {
    /// The mode this state publishes, or `None` when the previous mode stands.
    ///
    /// A connectivity check only observes; it never changes what
    /// consumers see.
    pub fn mode(self) -> Option<NetworkMode> {
        match self {
            Self::Unknown => Some(NetworkMode::Unknown),
            Self::CheckingConnectivity => None,
            Self::ClientConnected => Some(NetworkMode::ClientConnected),
            Self::HotspotActive => Some(NetworkMode::HotspotActive),
            Self::StartingHotspot | Self::StoppingHotspot | Self::ConnectingToNetwork => {
                Some(NetworkMode::Transitioning)
            }
        }
    }

    /// States the arbiter rests in between ticks.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Unknown | Self::ClientConnected | Self::HotspotActive | Self::ConnectingToNetwork
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn checking_keeps_previous_mode() {
        assert_eq!(ArbiterState::CheckingConnectivity.mode(), None);
        assert_eq!(
            ArbiterState::StoppingHotspot.mode(),
            Some(NetworkMode::Transitioning)
        );
    }

    #[test]
    fn wire_names_are_snake_case() {
        assert_eq!(NetworkMode::HotspotActive.to_string(), "hotspot_active");
        assert_eq!(
            ArbiterState::from_str("connecting_to_network").ok(),
            Some(ArbiterState::ConnectingToNetwork)
        );
        assert_eq!(
            serde_json::to_string(&NetworkMode::ClientConnected).ok().as_deref(),
            Some("\"client_connected\"")
        );
    }
}
