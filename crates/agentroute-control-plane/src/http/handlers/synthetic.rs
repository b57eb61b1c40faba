//! Synthetic task handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use agentroute_core::CoreError;

use crate::http::responses::{error_response, EnqueueSyntheticRequest};
use crate::orchestrator::OrchestratorError;
use crate::state::AppState;

/// Create PENDING synthetic tasks for an EXPERIMENTAL agent.
pub async fn enqueue_synthetic(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EnqueueSyntheticRequest>,
) -> Response {
    match state
        .orchestrator
        .enqueue_for_agent(&body.agent_id, body.count)
        .await
    {
        Ok(tasks) => (StatusCode::CREATED, Json(tasks)).into_response(),
        Err(e) => {
            warn!(agent_id = %body.agent_id, error = %e, "Synthetic enqueue rejected");
            let status = match e {
                OrchestratorError::Core(CoreError::AgentNotFound(_)) => StatusCode::NOT_FOUND,
                OrchestratorError::NotExperimental(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            };
            error_response(status, e.to_string())
        }
    }
}

/// Run one batch of PENDING synthetic tasks.
pub async fn run_synthetic(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.run_batch().await)
}

/// List synthetic tasks, oldest first.
pub async fn list_synthetic(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.list().await)
}
