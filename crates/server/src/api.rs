//! HTTP request handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use labwatch_alert::{BulkItemResult, CycleSummary};
use labwatch_core::{Alert, LabwatchError};
use labwatch_notify::{ChannelTypeDefinition, DispatchResult};

use crate::state::AppState;

// ── Response/request types ──────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct BulkResponse {
    pub results: Vec<BulkItemResult>,
}

#[derive(Deserialize)]
pub struct SnoozeRequest {
    /// Minutes from now. Zero clears an existing snooze.
    pub minutes: u32,
}

#[derive(Deserialize)]
pub struct MuteRequest {
    /// Minutes from now. Zero unmutes.
    pub minutes: u32,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: LabwatchError) -> ApiError {
    let status = match e {
        LabwatchError::RuleNotFound(_)
        | LabwatchError::AlertNotFound(_)
        | LabwatchError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn alerts_open(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    state.lifecycle.list_open().await.map(Json).map_err(api_error)
}

pub async fn alerts_for_server(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<Uuid>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    state
        .lifecycle
        .list_open_for_server(server_id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn alert_acknowledge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, ApiError> {
    state.lifecycle.acknowledge(id).await.map(Json).map_err(api_error)
}

pub async fn alert_resolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, ApiError> {
    state.lifecycle.resolve(id).await.map(Json).map_err(api_error)
}

pub async fn alert_snooze(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SnoozeRequest>,
) -> Result<Json<Alert>, ApiError> {
    state
        .lifecycle
        .snooze(id, req.minutes)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn alerts_acknowledge_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BulkResponse>, ApiError> {
    state
        .lifecycle
        .acknowledge_all()
        .await
        .map(|results| Json(BulkResponse { results }))
        .map_err(api_error)
}

pub async fn alerts_resolve_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BulkResponse>, ApiError> {
    state
        .lifecycle
        .resolve_all()
        .await
        .map(|results| Json(BulkResponse { results }))
        .map_err(api_error)
}

pub async fn rule_mute(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<Uuid>,
    Json(req): Json<MuteRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .lifecycle
        .mute_rule(rule_id, req.minutes)
        .await
        .map(|()| Json(StatusResponse { status: "ok" }))
        .map_err(api_error)
}

pub async fn channel_test(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<Uuid>,
) -> Result<Json<DispatchResult>, ApiError> {
    state
        .dispatcher
        .test_send(channel_id)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn channel_types(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ChannelTypeDefinition>> {
    Json(state.registry.list().to_vec())
}

/// Run one evaluation pass immediately, outside the schedule.
pub async fn evaluate(State(state): State<Arc<AppState>>) -> Json<CycleSummary> {
    Json(state.cycle.run(Utc::now()).await)
}
