//! Readiness probe for the registration service.
//!
//! Liveness is `hub_web::handlers::health_check`; readiness also pings the
//! store.

use super::state::AppState;
use crate::store::RegistrationStore;
use axum::{Json, extract::State, http::StatusCode};
use hub_web::handlers::{ComponentHealth, ReadinessResponse, readiness};

/// Readiness check endpoint.
///
/// Returns 200 when the database answers, 503 otherwise.
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"ready":true,"components":[{"component":"database","healthy":true}]}
/// ```
pub async fn readiness_check<S: RegistrationStore>(
    State(state): State<AppState<S>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let database = match state.service.store().ping().await {
        Ok(()) => ComponentHealth::healthy("database"),
        Err(err) => ComponentHealth::unhealthy("database", err.to_string()),
    };
    readiness(vec![database])
}
