// Robot orchestrator HTTP client
//
// The orchestrator exposes `GET /status` answering `{"message": "<json>"}`
// where the inner string carries the per-service states.

use std::time::Duration;

use serde::Deserialize;
use tracing::trace;
use url::Url;

use crate::error::Error;
use crate::models::RobotStatus;

pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://localhost:5000/status";

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    message: Option<String>,
}

/// Raw HTTP client for the orchestrator status endpoint.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    url: Url,
}

impl ServiceClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, Url::parse(url)?))
    }

    /// Use a pre-built `reqwest::Client` (tests, shared pools).
    pub fn with_client(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch and decode the robot service status.
    pub async fn robot_status(&self) -> Result<RobotStatus, Error> {
        trace!(url = %self.url, "GET");
        let resp = self.http.get(self.url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }

        let body = resp.text().await?;
        let envelope: Envelope = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;
        let inner = envelope.message.unwrap_or_else(|| "{}".into());
        serde_json::from_str(&inner).map_err(|e| Error::Deserialization {
            message: format!("status message: {e}"),
            body: inner,
        })
    }
}
