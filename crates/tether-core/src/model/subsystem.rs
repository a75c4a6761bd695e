// Per-subsystem health records.
//
// One tagged variant per kind; every variant carries its own health,
// a free-form detail and the time it was observed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use crate::config::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Health {
    Running,
    /// Up, but not doing its job (a stream program with no stream).
    Degraded,
    Stopped,
    /// Reachable, but the state could not be determined.
    Unknown,
    /// The probe itself failed or timed out.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubsystemKind {
    Container,
    Stream,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerStatus {
    pub health: Health,
    pub running: bool,
    /// Resolved container name.
    pub container: Option<String>,
    /// Docker's own state string.
    pub state: Option<String>,
    pub started_at: Option<String>,
    pub detail: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub health: Health,
    pub media: Option<MediaKind>,
    pub cloud: bool,
    /// Supervisor program state, when the stream has a program.
    pub program_state: Option<String>,
    pub pid: Option<u32>,
    /// Whether RTSP data was seen, when checked.
    pub streaming: Option<bool>,
    /// Codec types reported by ffprobe.
    pub codecs: Option<String>,
    pub device_accessible: Option<bool>,
    pub detail: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub health: Health,
    /// Service name to reported state.
    pub services: BTreeMap<String, String>,
    pub is_charging: Option<bool>,
    pub battery_soc: Option<f64>,
    pub detail: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Health record for one monitored subsystem.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubsystemStatus {
    Container(ContainerStatus),
    Stream(StreamStatus),
    Service(ServiceStatus),
}

impl SubsystemStatus {
    /// Entry for a subsystem whose probe failed. Never omitted from a snapshot.
    pub fn unavailable(kind: SubsystemKind, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::placeholder(kind, Health::Unavailable, reason.into(), at)
    }

    /// Entry for a subsystem that has not been polled yet.
    pub fn unknown(kind: SubsystemKind, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::placeholder(kind, Health::Unknown, reason.into(), at)
    }

    fn placeholder(kind: SubsystemKind, health: Health, detail: String, at: DateTime<Utc>) -> Self {
        let detail = Some(detail);
        match kind {
            SubsystemKind::Container => Self::Container(ContainerStatus {
                health,
                running: false,
                container: None,
                state: None,
                started_at: None,
                detail,
                observed_at: at,
            }),
            SubsystemKind::Stream => Self::Stream(StreamStatus {
                health,
                media: None,
                cloud: false,
                program_state: None,
                pid: None,
                streaming: None,
                codecs: None,
                device_accessible: None,
                detail,
                observed_at: at,
            }),
            SubsystemKind::Service => Self::Service(ServiceStatus {
                health,
                services: BTreeMap::new(),
                is_charging: None,
                battery_soc: None,
                detail,
                observed_at: at,
            }),
        }
    }

    pub fn kind(&self) -> SubsystemKind {
        match self {
            Self::Container(_) => SubsystemKind::Container,
            Self::Stream(_) => SubsystemKind::Stream,
            Self::Service(_) => SubsystemKind::Service,
        }
    }

    pub fn health(&self) -> Health {
        match self {
            Self::Container(s) => s.health,
            Self::Stream(s) => s.health,
            Self::Service(s) => s.health,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Container(s) => s.detail.as_deref(),
            Self::Stream(s) => s.detail.as_deref(),
            Self::Service(s) => s.detail.as_deref(),
        }
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        match self {
            Self::Container(s) => s.observed_at,
            Self::Stream(s) => s.observed_at,
            Self::Service(s) => s.observed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_entry_keeps_kind_and_reason() {
        let now = Utc::now();
        let status = SubsystemStatus::unavailable(SubsystemKind::Stream, "probe timed out", now);
        assert_eq!(status.kind(), SubsystemKind::Stream);
        assert_eq!(status.health(), Health::Unavailable);
        assert_eq!(status.detail(), Some("probe timed out"));
        assert_eq!(status.observed_at(), now);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let status = SubsystemStatus::unknown(SubsystemKind::Container, "not yet polled", Utc::now());
        let value = serde_json::to_value(&status).unwrap_or_default();
        assert_eq!(value["kind"], "container");
        assert_eq!(value["health"], "unknown");
    }
}
