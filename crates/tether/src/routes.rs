//! API routes.
//!
//! Readers only look at the published store; the only write path is a
//! join request forwarded to the connection manager.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use tether_core::{
    ArbiterState, ConnectionAttempt, CoreError, DisconnectOutcome, JoinAccepted, NetworkMode,
    ScannedNetwork, Snapshot, SubsystemKind, SubsystemStatus,
};

use crate::server::AppState;

type AppStateArc = Arc<AppState>;

pub fn api_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(full_status))
        .route("/status/wifi", get(wifi_status))
        .route("/status/containers", get(container_status))
        .route("/status/streams", get(stream_status))
        .route("/status/services", get(service_status))
        .route("/wifi/connect", post(connect))
        .route("/wifi/networks", get(networks))
        .route("/wifi/disconnect", post(disconnect))
}

// ── Errors ───────────────────────────────────────────────────────────

/// `{ "error": "..." }` with a status derived from the core error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
            CoreError::RadioBusy { .. } => StatusCode::CONFLICT,
            CoreError::Privilege { .. } => StatusCode::FORBIDDEN,
            CoreError::SubsystemUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

// ── Health ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

/// Liveness of this process only.
async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusResponse {
    stale: bool,
    #[serde(flatten)]
    snapshot: Arc<Snapshot>,
}

async fn full_status(State(state): State<AppStateArc>) -> Json<StatusResponse> {
    let snapshot = state.supervisor.store().snapshot();
    let stale = snapshot.is_stale(Utc::now(), state.stale_after);
    if stale {
        debug!(sequence = snapshot.sequence, "serving stale snapshot");
    }
    Json(StatusResponse { stale, snapshot })
}

#[derive(Serialize)]
struct WifiStatus {
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssid: Option<String>,
    mode: NetworkMode,
    state: ArbiterState,
    hotspot_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    hotspot_ssid: Option<String>,
    changed_at: DateTime<Utc>,
    attempt: Option<Arc<ConnectionAttempt>>,
}

/// Reads the live network status rather than the last snapshot, so a
/// mode change is visible before the next aggregation cycle.
async fn wifi_status(State(state): State<AppStateArc>) -> Json<WifiStatus> {
    let supervisor = &state.supervisor;
    let network = supervisor.store().network();
    let connected = network.mode == NetworkMode::ClientConnected;
    Json(WifiStatus {
        connected,
        ssid: network.uplink.clone().filter(|_| connected),
        mode: network.mode,
        state: network.state,
        hotspot_active: network.hotspot_active,
        hotspot_ssid: network
            .hotspot_active
            .then(|| supervisor.config().access_point.ssid.clone()),
        changed_at: network.changed_at,
        attempt: supervisor.store().attempt(),
    })
}

fn subsystems_of(state: &AppState, kind: SubsystemKind) -> BTreeMap<String, SubsystemStatus> {
    state
        .supervisor
        .store()
        .snapshot()
        .of_kind(kind)
        .into_iter()
        .map(|(name, status)| (name.to_owned(), status.clone()))
        .collect()
}

async fn container_status(
    State(state): State<AppStateArc>,
) -> Json<BTreeMap<String, SubsystemStatus>> {
    Json(subsystems_of(&state, SubsystemKind::Container))
}

async fn stream_status(State(state): State<AppStateArc>) -> Json<BTreeMap<String, SubsystemStatus>> {
    Json(subsystems_of(&state, SubsystemKind::Stream))
}

async fn service_status(
    State(state): State<AppStateArc>,
) -> Json<BTreeMap<String, SubsystemStatus>> {
    Json(subsystems_of(&state, SubsystemKind::Service))
}

// ── WiFi ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ConnectRequest {
    ssid: String,
    #[serde(default, deserialize_with = "deserialize_password")]
    password: Option<SecretString>,
}

fn deserialize_password<'de, D: Deserializer<'de>>(de: D) -> Result<Option<SecretString>, D::Error> {
    Option::<String>::deserialize(de).map(|p| p.map(SecretString::from))
}

#[derive(Serialize)]
struct ConnectResponse {
    status: &'static str,
    #[serde(flatten)]
    accepted: JoinAccepted,
}

/// Accept a join and return at once; the outcome shows up in
/// `status/wifi` later.
async fn connect(
    State(state): State<AppStateArc>,
    body: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConnectResponse>), ApiError> {
    let Json(request) = body?;
    let accepted = state
        .supervisor
        .wifi()
        .request_connect(&request.ssid, request.password)
        .inspect_err(|e| warn!(error = %e, ssid = %request.ssid, "join request rejected"))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ConnectResponse {
            status: "connecting",
            accepted,
        }),
    ))
}

#[derive(Serialize)]
struct NetworksResponse {
    interface: String,
    networks: Vec<ScannedNetwork>,
}

async fn networks(State(state): State<AppStateArc>) -> Json<NetworksResponse> {
    let networks = state.supervisor.wifi().scan().await;
    Json(NetworksResponse {
        interface: state.supervisor.config().interface.clone(),
        networks,
    })
}

async fn disconnect(State(state): State<AppStateArc>) -> Result<Json<DisconnectOutcome>, ApiError> {
    let outcome = state.supervisor.wifi().disconnect().await?;
    Ok(Json(outcome))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tether_core::executor::{
        AccessPointSpec, ActiveConnection, ConnectionKind, Deactivation, InterfaceState,
    };
    use tether_core::{
        CommandExecutor, ContainerStatus, CoreConfig, ExecError, Health, RadioUser, STALE_SLACK,
        SubsystemProbe, Supervisor,
    };
    use chrono::TimeDelta;
    use tower::ServiceExt;

    use super::*;
    use crate::server::router;

    const IFACE: &str = "wlan-api";

    /// Radio with no uplink and a couple of visible networks. A join
    /// always succeeds.
    #[derive(Default)]
    struct StubExecutor {
        connection: Mutex<Option<String>>,
    }

    #[async_trait]
    impl CommandExecutor for StubExecutor {
        async fn active_connections(&self) -> Result<Vec<ActiveConnection>, ExecError> {
            Ok(self
                .connection
                .lock()
                .unwrap()
                .iter()
                .map(|name| ActiveConnection {
                    name: name.clone(),
                    kind: ConnectionKind::Wireless,
                    device: Some(IFACE.into()),
                })
                .collect())
        }

        async fn interface_state(&self, interface: &str) -> Result<Option<InterfaceState>, ExecError> {
            let connection = self.connection.lock().unwrap().clone();
            Ok(Some(InterfaceState {
                interface: interface.into(),
                state: if connection.is_some() { "connected" } else { "disconnected" }.into(),
                connected: connection.is_some(),
                connection,
            }))
        }

        async fn scan(&self, _interface: &str) -> Result<Vec<ScannedNetwork>, ExecError> {
            Ok(vec![ScannedNetwork {
                ssid: "HomeNet".into(),
                signal: 71,
                security: "WPA2".into(),
                in_use: false,
            }])
        }

        async fn ensure_access_point(&self, _spec: &AccessPointSpec) -> Result<(), ExecError> {
            Ok(())
        }

        async fn activate(&self, _profile: &str) -> Result<(), ExecError> {
            Ok(())
        }

        async fn deactivate(&self, _profile: &str) -> Result<Deactivation, ExecError> {
            Ok(Deactivation::NotActive)
        }

        async fn join(
            &self,
            _interface: &str,
            ssid: &str,
            _password: Option<&SecretString>,
        ) -> Result<(), ExecError> {
            *self.connection.lock().unwrap() = Some(ssid.to_owned());
            Ok(())
        }

        async fn forget(&self, _profile: &str) -> Result<(), ExecError> {
            Ok(())
        }

        async fn disconnect(&self, _interface: &str) -> Result<(), ExecError> {
            *self.connection.lock().unwrap() = None;
            Ok(())
        }
    }

    struct RunningContainer;

    #[async_trait]
    impl SubsystemProbe for RunningContainer {
        fn name(&self) -> &str {
            "ros2_sensor"
        }

        fn kind(&self) -> SubsystemKind {
            SubsystemKind::Container
        }

        async fn poll(&self) -> Result<SubsystemStatus, CoreError> {
            Ok(SubsystemStatus::Container(ContainerStatus {
                health: Health::Running,
                running: true,
                container: Some("om1_sensor".into()),
                state: Some("running".into()),
                started_at: None,
                detail: None,
                observed_at: Utc::now(),
            }))
        }
    }

    fn supervisor() -> Supervisor {
        let config = CoreConfig {
            interface: IFACE.into(),
            ..CoreConfig::default()
        };
        Supervisor::new(
            config,
            Arc::new(StubExecutor::default()),
            vec![Arc::new(RunningContainer) as Arc<dyn SubsystemProbe>],
        )
    }

    fn app(supervisor: &Supervisor) -> Router {
        router(Arc::new(AppState::new(supervisor.clone())))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_process_liveness() {
        let (status, body) = send(app(&supervisor()), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_accepted_without_echoing_the_password() {
        let sup = supervisor();
        let request = post_json(
            "/api/wifi/connect",
            &json!({ "ssid": "HomeNet", "password": "hunter2222" }),
        );
        let (status, body) = send(app(&sup), request).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "connecting");
        assert_eq!(body["ssid"], "HomeNet");
        assert!(!body.to_string().contains("hunter2222"));

        let (_, wifi) = send(app(&sup), get("/api/status/wifi")).await;
        assert_eq!(wifi["state"], "connecting_to_network");
        assert_eq!(wifi["mode"], "transitioning");
        assert_eq!(wifi["attempt"]["outcome"], "pending");
        assert!(!wifi.to_string().contains("hunter2222"));
    }

    #[tokio::test(start_paused = true)]
    async fn join_outcome_is_observable_by_polling() {
        let sup = supervisor();
        let request = post_json("/api/wifi/connect", &json!({ "ssid": "HomeNet" }));
        let (status, _) = send(app(&sup), request).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let (_, wifi) = send(app(&sup), get("/api/status/wifi")).await;
        assert_eq!(wifi["attempt"]["outcome"], "succeeded");
    }

    #[tokio::test]
    async fn empty_ssid_is_a_bad_request() {
        let request = post_json("/api/wifi/connect", &json!({ "ssid": "  ", "password": "x" }));
        let (status, body) = send(app(&supervisor()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("SSID"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request_with_error() {
        let request = post_json("/api/wifi/connect", &json!({ "password": "hunter2222" }));
        let (status, body) = send(app(&supervisor()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn connect_during_hotspot_transition_conflicts() {
        let sup = supervisor();
        let _transition = sup.radio().try_acquire(RadioUser::Hotspot).unwrap();
        let request = post_json("/api/wifi/connect", &json!({ "ssid": "HomeNet" }));
        let (status, body) = send(app(&sup), request).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("hotspot transition"));
        assert!(sup.store().attempt().is_none());
    }

    #[tokio::test]
    async fn subsystem_routes_filter_by_kind() {
        let sup = supervisor();
        sup.aggregator().collect().await.unwrap();

        let (_, containers) = send(app(&sup), get("/api/status/containers")).await;
        assert_eq!(containers["ros2_sensor"]["health"], "running");
        assert_eq!(containers["ros2_sensor"]["kind"], "container");

        let (_, streams) = send(app(&sup), get("/api/status/streams")).await;
        assert_eq!(streams, json!({}));
    }

    #[tokio::test]
    async fn full_status_carries_stale_flag() {
        let sup = supervisor();
        sup.aggregator().collect().await.unwrap();
        let (status, body) = send(app(&sup), get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stale"], false);
        assert_eq!(body["sequence"], 1);
        assert_eq!(body["network"]["mode"], "unknown");
    }

    #[tokio::test]
    async fn snapshot_is_stale_once_an_interval_is_missed() {
        let sup = supervisor();
        sup.aggregator().collect().await.unwrap();
        let state = AppState::new(sup.clone());
        let snapshot = sup.store().snapshot();
        let interval = TimeDelta::from_std(sup.config().aggregator.interval).unwrap();

        assert!(!snapshot.is_stale(snapshot.generated_at + interval, state.stale_after));
        let past_slack = interval + TimeDelta::from_std(STALE_SLACK).unwrap();
        assert!(snapshot.is_stale(
            snapshot.generated_at + past_slack + TimeDelta::milliseconds(1),
            state.stale_after
        ));
        assert!(snapshot.is_stale(snapshot.generated_at + interval * 3 / 2, state.stale_after));
    }

    #[tokio::test]
    async fn unbounded_interval_does_not_overflow_threshold() {
        let mut config = CoreConfig {
            interface: IFACE.into(),
            ..CoreConfig::default()
        };
        config.aggregator.interval = Duration::MAX;
        let sup = Supervisor::new(config, Arc::new(StubExecutor::default()), Vec::new());
        assert_eq!(AppState::new(sup).stale_after, TimeDelta::MAX);
    }

    #[tokio::test]
    async fn networks_lists_scan_results() {
        let (_, body) = send(app(&supervisor()), get("/api/wifi/networks")).await;
        assert_eq!(body["interface"], IFACE);
        assert_eq!(body["networks"][0]["ssid"], "HomeNet");
    }

    #[tokio::test]
    async fn disconnect_without_client_network_reports_not_connected() {
        let request = Request::post("/api/wifi/disconnect").body(Body::empty()).unwrap();
        let (status, body) = send(app(&supervisor()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "not_connected");
    }
}
