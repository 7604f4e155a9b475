//! Router configuration for the registration service.

use super::health::readiness_check;
use super::state::AppState;
use crate::api::{checkouts, waitlist};
use crate::store::RegistrationStore;
use axum::{
    Router,
    routing::{get, post},
};
use hub_web::correlation_id_layer;
use hub_web::handlers::health_check;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health probes sit at the root; everything else is under `/api`.
pub fn build_router<S: RegistrationStore>(state: AppState<S>) -> Router {
    let api_routes = Router::new()
        .route(
            "/event-sessions/:session_id/checkout",
            post(checkouts::start_checkout::<S>),
        )
        .route(
            "/event-sessions/:session_id/waitlist",
            get(waitlist::list_waitlist::<S>),
        )
        .route(
            "/event-checkout-sessions/:checkout_id",
            get(checkouts::checkout_details::<S>).put(checkouts::update_checkout::<S>),
        )
        .route(
            "/event-checkout-sessions/:checkout_id/payment",
            post(checkouts::process_payment::<S>),
        )
        .route(
            "/waitlist/:entry_id/promote",
            post(waitlist::promote_waitlist_entry::<S>),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<S>))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
