//! HTTP client for the storage backend.
//!
//! Fetches one container snapshot per visualization session from
//! `GET {base}/api/containers/{id}`. The reply is always wrapped in
//! `{ success, data, error }`.

use reqwest::Url;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::model::{ApiEnvelope, ContainerSnapshot, ValidationError};

fn user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    format!("stowage-scene/{version} ({os}; {arch})")
}

/// Reasons a container snapshot could not be obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid container id: {0}")]
    InvalidId(String),
    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Backend answered with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Could not decode backend reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Backend reported an error: {0}")]
    Unsuccessful(String),
    #[error("Container data is invalid: {0}")]
    InvalidSnapshot(#[from] ValidationError),
}

#[derive(Clone, Debug)]
pub struct ContainerClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ContainerClient {
    pub fn new(config: &BackendConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(user_agent())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url().clone(),
        })
    }

    /// Builds the lookup URL, rejecting ids that are not a single path segment.
    pub fn container_url(&self, container_id: &str) -> Result<Url, FetchError> {
        let id = validate_container_id(container_id)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::InvalidId(format!("backend URL {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "containers", id]);
        Ok(url)
    }

    /// Fetches and validates a container snapshot.
    ///
    /// The HTTP status is checked before the body is decoded. A reply with
    /// `success: false` is an error carrying the backend's message.
    pub async fn fetch_container(&self, container_id: &str) -> Result<ContainerSnapshot, FetchError> {
        let url = self.container_url(container_id)?;
        tracing::debug!(%url, "fetching container");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
                .unwrap_or_else(|| {
                    let text = String::from_utf8_lossy(&body).trim().to_string();
                    if text.is_empty() {
                        status.canonical_reason().unwrap_or("unknown").to_string()
                    } else {
                        text
                    }
                });
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<ContainerSnapshot> = serde_json::from_slice(&body)?;
        if !envelope.success {
            return Err(FetchError::Unsuccessful(
                envelope
                    .error
                    .unwrap_or_else(|| "Failed to fetch container data".to_string()),
            ));
        }
        let snapshot = envelope.data.ok_or_else(|| {
            FetchError::Unsuccessful("Reply contained no container data".to_string())
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

fn validate_container_id(raw: &str) -> Result<&str, FetchError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(FetchError::InvalidId("container id must not be empty".to_string()));
    }
    if id == "." || id == ".." {
        return Err(FetchError::InvalidId(format!("'{id}' is not a container id")));
    }
    if id.contains('/') || id.contains('\\') || id.chars().any(char::is_control) {
        return Err(FetchError::InvalidId(format!(
            "'{}' must be a single path segment",
            id.escape_debug()
        )));
    }
    Ok(id)
}

/// In-process fake of the storage backend.
#[cfg(test)]
pub(crate) mod testing {
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::Router;
    use axum::extract::{Json, Path};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use reqwest::Url;
    use serde_json::json;

    use crate::model::ContainerSnapshot;
    use crate::model::fixtures::{container, item};

    /// Delay of the `slow` container.
    pub const SLOW_DELAY: Duration = Duration::from_millis(300);

    pub fn snapshot(id: &str) -> ContainerSnapshot {
        let mut first = item("001", Some((0.0, 0.0, 0.0)), (10.0, 10.0, 10.0));
        first.name = "Food Packet".to_string();
        let mut second = item("002", Some((20.0, 0.0, 0.0)), (10.0, 10.0, 10.0));
        second.name = "Oxygen Cylinder".to_string();
        let mut snapshot = container(vec![first, second, item("003", None, (5.0, 5.0, 5.0))]);
        snapshot.id = id.to_string();
        snapshot
    }

    async fn container_route(Path(id): Path<String>) -> Response {
        match id.as_str() {
            "contA" | "contB" => Json(json!({ "success": true, "data": snapshot(&id) })).into_response(),
            "slow" => {
                tokio::time::sleep(SLOW_DELAY).await;
                Json(json!({ "success": true, "data": snapshot(&id) })).into_response()
            }
            "broken" => Json(json!({
                "success": false,
                "error": "Container data is locked"
            }))
            .into_response(),
            "garbage" => (StatusCode::OK, "<html>not json</html>").into_response(),
            "flat" => Json(json!({
                "success": true,
                "data": { "id": "flat", "width": 100.0, "depth": 0.0, "height": 60.0, "items": [] }
            }))
            .into_response(),
            other => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "success": false,
                    "error": format!("Container {other} not found")
                })),
            )
                .into_response(),
        }
    }

    /// Starts the fake backend on an ephemeral port and returns its base URL.
    pub async fn spawn_backend() -> Url {
        let app = Router::new().route("/api/containers/{id}", get(container_route));
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}")).expect("fake backend URL")
    }
}
