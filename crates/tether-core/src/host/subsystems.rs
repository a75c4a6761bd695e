use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tether_host::{ContainerState, Docker, RobotStatus, ServiceClient, SupervisorProgram};

use crate::aggregator::SubsystemProbe;
use crate::config::{ContainerSpec, MediaKind, StreamSpec};
use crate::error::CoreError;
use crate::model::{
    ContainerStatus, Health, ServiceStatus, StreamStatus, SubsystemKind, SubsystemStatus,
};

fn unavailable(name: &str, err: &tether_host::Error) -> CoreError {
    CoreError::SubsystemUnavailable {
        name: name.to_owned(),
        reason: err.to_string(),
    }
}

// ── Containers ───────────────────────────────────────────────────────

pub struct ContainerProbe {
    spec: ContainerSpec,
    docker: Docker,
}

impl ContainerProbe {
    pub fn new(spec: ContainerSpec, docker: Docker) -> Self {
        Self { spec, docker }
    }
}

#[async_trait]
impl SubsystemProbe for ContainerProbe {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Container
    }

    async fn poll(&self) -> Result<SubsystemStatus, CoreError> {
        let found = self
            .docker
            .find_container(&self.spec.container)
            .await
            .map_err(|e| unavailable(&self.spec.name, &e))?;
        let Some(container) = found else {
            return Ok(SubsystemStatus::Container(ContainerStatus {
                health: Health::Stopped,
                running: false,
                container: None,
                state: Some("not_found".into()),
                started_at: None,
                detail: Some(format!("no container matching `{}`", self.spec.container)),
                observed_at: Utc::now(),
            }));
        };
        let state = self
            .docker
            .inspect_state(&container)
            .await
            .map_err(|e| unavailable(&self.spec.name, &e))?;
        Ok(SubsystemStatus::Container(container_status(state)))
    }
}

fn container_status(state: ContainerState) -> ContainerStatus {
    let health = match state.status.as_str() {
        _ if state.running => Health::Running,
        "restarting" | "paused" => Health::Degraded,
        "exited" | "dead" | "created" | "removing" => Health::Stopped,
        _ => Health::Unknown,
    };
    ContainerStatus {
        health,
        running: state.running,
        container: Some(state.name),
        state: Some(state.status),
        started_at: state.started_at,
        detail: None,
        observed_at: Utc::now(),
    }
}

// ── Streams ──────────────────────────────────────────────────────────

pub struct StreamProbe {
    spec: StreamSpec,
    docker: Docker,
}

impl StreamProbe {
    pub fn new(spec: StreamSpec, docker: Docker) -> Self {
        Self { spec, docker }
    }

    /// Streams published outside supervisor: alive iff RTSP answers.
    async fn poll_rtsp_only(&self, path: &str) -> Result<StreamStatus, tether_host::Error> {
        let codecs = self.docker.rtsp_codecs(&self.spec.container, path).await?;
        let streaming = codecs.is_some();
        Ok(StreamStatus {
            health: if streaming { Health::Running } else { Health::Stopped },
            media: Some(self.spec.media),
            cloud: self.spec.cloud,
            program_state: None,
            pid: None,
            streaming: Some(streaming),
            codecs,
            device_accessible: None,
            detail: (!streaming).then(|| format!("no data on rtsp path `{path}`")),
            observed_at: Utc::now(),
        })
    }

    async fn poll_program(&self, program: &str) -> Result<StreamStatus, tether_host::Error> {
        let programs = self.docker.supervisor_status(&self.spec.container).await?;
        let Some(entry) = programs.into_iter().find(|p| p.name == program) else {
            return Ok(StreamStatus {
                detail: Some(format!("program `{program}` not configured in supervisor")),
                ..self.base(Health::Unknown, None)
            });
        };
        if !entry.is_running() || self.spec.cloud {
            return Ok(self.base(program_health(&entry), Some(&entry)));
        }

        let mut status = self.base(Health::Running, Some(&entry));
        if let Some(device) = &self.spec.device {
            let present = self.docker.device_present(&self.spec.container, device).await?;
            status.device_accessible = Some(present);
            if !present {
                status.health = Health::Degraded;
                status.detail = Some(format!("device {device} not accessible"));
            }
        }
        if self.spec.media == MediaKind::Audio {
            let audio = self.docker.audio_available(&self.spec.container).await?;
            status.device_accessible = Some(audio);
            if !audio {
                status.health = Health::Degraded;
                status.detail = Some("audio system not available".into());
            }
        }
        if let Some(path) = &self.spec.rtsp_path {
            let codecs = self.docker.rtsp_codecs(&self.spec.container, path).await?;
            status.streaming = Some(codecs.is_some());
            if codecs.is_none() {
                status.health = Health::Degraded;
                status.detail = Some("running_no_stream".into());
            }
            status.codecs = codecs;
        }
        Ok(status)
    }

    fn base(&self, health: Health, program: Option<&SupervisorProgram>) -> StreamStatus {
        StreamStatus {
            health,
            media: Some(self.spec.media),
            cloud: self.spec.cloud,
            program_state: program.map(|p| p.status.to_ascii_lowercase()),
            pid: program.and_then(|p| p.pid),
            streaming: None,
            codecs: None,
            device_accessible: None,
            detail: None,
            observed_at: Utc::now(),
        }
    }
}

fn program_health(program: &SupervisorProgram) -> Health {
    match program.status.to_ascii_uppercase().as_str() {
        "RUNNING" => Health::Running,
        "STARTING" | "BACKOFF" => Health::Degraded,
        "STOPPED" | "STOPPING" | "EXITED" | "FATAL" => Health::Stopped,
        _ => Health::Unknown,
    }
}

#[async_trait]
impl SubsystemProbe for StreamProbe {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Stream
    }

    async fn poll(&self) -> Result<SubsystemStatus, CoreError> {
        let status = match (&self.spec.program, &self.spec.rtsp_path) {
            (Some(program), _) => self.poll_program(program).await,
            (None, Some(path)) => self.poll_rtsp_only(path).await,
            (None, None) => {
                return Err(CoreError::SubsystemUnavailable {
                    name: self.spec.name.clone(),
                    reason: "stream has neither a program nor an rtsp path".into(),
                });
            }
        };
        status
            .map(SubsystemStatus::Stream)
            .map_err(|e| unavailable(&self.spec.name, &e))
    }
}

// ── Robot services ───────────────────────────────────────────────────

pub struct ServiceProbe {
    name: String,
    client: ServiceClient,
}

impl ServiceProbe {
    pub fn new(name: impl Into<String>, client: ServiceClient) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl SubsystemProbe for ServiceProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Service
    }

    async fn poll(&self) -> Result<SubsystemStatus, CoreError> {
        let status = self
            .client
            .robot_status()
            .await
            .map_err(|e| unavailable(&self.name, &e))?;
        Ok(SubsystemStatus::Service(service_status(status)))
    }
}

fn service_status(status: RobotStatus) -> ServiceStatus {
    let services: BTreeMap<String, String> = [
        ("slam", status.slam),
        ("nav2", status.nav2),
        ("base_control", status.base_control),
        ("charging_dock", status.charging_dock),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v))
    .collect();
    let all_unknown = services.values().all(|v| v == "unknown");
    ServiceStatus {
        health: if all_unknown { Health::Unknown } else { Health::Running },
        services,
        is_charging: Some(status.is_charging),
        battery_soc: Some(status.battery_soc),
        detail: None,
        observed_at: Utc::now(),
    }
}
