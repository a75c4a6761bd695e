//! HTTP server for the tether API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use chrono::TimeDelta;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tether_core::Supervisor;

use crate::error::CliError;
use crate::routes;

/// Application state shared across handlers.
pub struct AppState {
    pub supervisor: Supervisor,
    pub started_at: Instant,
    /// Snapshots older than this are flagged stale.
    pub stale_after: TimeDelta,
}

impl AppState {
    pub fn new(supervisor: Supervisor) -> Self {
        let stale_after = TimeDelta::from_std(supervisor.config().aggregator.stale_after())
            .unwrap_or(TimeDelta::MAX);
        Self {
            supervisor,
            started_at: Instant::now(),
            stale_after,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener before anything touches the radio, so a taken port
/// fails fast.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, CliError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::Bind { addr, source })
}

/// Serve until SIGINT or SIGTERM.
pub async fn run(listener: TcpListener, supervisor: Supervisor) -> Result<(), CliError> {
    let addr = listener.local_addr()?;
    let app = router(Arc::new(AppState::new(supervisor)));
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("interrupt received, shutting down"),
        () = terminate => info!("terminate received, shutting down"),
    }
}
