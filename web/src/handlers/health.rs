//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Liveness response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the process answers
    pub status: String,
}

/// Simple health check endpoint (for basic liveness).
///
/// Does NOT check dependencies (database, payment gateway).
///
/// ```text
/// GET /health
/// {"status":"ok"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Result of probing one dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Dependency name (e.g. `database`)
    pub component: String,
    /// Whether the probe succeeded
    pub healthy: bool,
    /// Failure detail, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    /// A passing probe.
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            healthy: true,
            message: None,
        }
    }

    /// A failing probe with its error message.
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            healthy: false,
            message: Some(message.into()),
        }
    }
}

/// Readiness response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// True when every component is healthy
    pub ready: bool,
    /// Individual probe results
    pub components: Vec<ComponentHealth>,
}

/// Build a readiness response from component probes.
///
/// - 200 OK when every component is healthy
/// - 503 Service Unavailable otherwise
#[must_use]
pub fn readiness(components: Vec<ComponentHealth>) -> (StatusCode, Json<ReadinessResponse>) {
    let ready = components.iter().all(|c| c.healthy);
    let status = if ready {
        StatusCode::OK
    } else {
        tracing::warn!(?components, "Readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, components }))
}
