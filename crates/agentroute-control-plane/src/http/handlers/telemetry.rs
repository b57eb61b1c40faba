//! Telemetry lookup handler.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use agentroute_core::RecordId;

use crate::http::responses::error_response;
use crate::state::AppState;

/// Fetch one telemetry record.
pub async fn get_telemetry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.router.telemetry().get(&RecordId::new(id.clone())).await {
        Some(record) => Json(record).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Telemetry record not found: {}", id),
        ),
    }
}
