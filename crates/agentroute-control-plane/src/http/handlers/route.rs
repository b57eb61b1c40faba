//! Routing handler.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};

use crate::router::RouteRequest;
use crate::state::AppState;

/// Route one canonical task. Failures are reported in the body with
/// `success: false`.
pub async fn route_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> impl IntoResponse {
    let routed = state.router.route(request).await;
    Json(routed.response)
}
