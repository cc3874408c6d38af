//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/alerts/open", get(api::alerts_open))
        .route("/alerts/server/{id}", get(api::alerts_for_server))
        // Bulk routes MUST precede /alerts/{id}/... so "acknowledge-all"
        // is not captured as an alert id.
        .route("/alerts/acknowledge-all", post(api::alerts_acknowledge_all))
        .route("/alerts/resolve-all", post(api::alerts_resolve_all))
        .route("/alerts/{id}/acknowledge", post(api::alert_acknowledge))
        .route("/alerts/{id}/resolve", post(api::alert_resolve))
        .route("/alerts/{id}/snooze", post(api::alert_snooze))
        .route("/rules/{id}/mute", post(api::rule_mute))
        .route("/channels/types", get(api::channel_types))
        .route("/channels/{id}/test", post(api::channel_test))
        .route("/evaluate", post(api::evaluate))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
