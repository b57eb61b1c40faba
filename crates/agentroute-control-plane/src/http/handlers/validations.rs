//! Validation callback and human override handlers.
//!
//! Both resolve the executing agent from the execution telemetry record the
//! event is keyed to, then append to the ledger. Neither re-runs the agent.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use agentroute_core::{AgentId, RecordId, ValidationEvent};

use crate::http::responses::{
    error_response, OverrideRequest, ValidationAccepted, ValidationCallback,
};
use crate::learning::AppendOutcome;
use crate::state::AppState;
use crate::telemetry::TelemetryKind;

/// Validator callback. Re-deliveries are accepted and dropped.
pub async fn record_validation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValidationCallback>,
) -> Response {
    let agent_id = match executing_agent(&state, &body.usage_log_id).await {
        Ok(agent_id) => agent_id,
        Err(response) => return response,
    };

    let event = ValidationEvent::new(body.usage_log_id, agent_id, body.score, body.label)
        .with_error_type(body.error_type)
        .with_explanation(body.explanation);
    append(&state, event).await
}

/// Human override of the stored judgement for one record.
pub async fn override_validation(
    State(state): State<Arc<AppState>>,
    Path(usage_log_id): Path<String>,
    Json(body): Json<OverrideRequest>,
) -> Response {
    let usage_log_id = RecordId::new(usage_log_id);
    let agent_id = match executing_agent(&state, &usage_log_id).await {
        Ok(agent_id) => agent_id,
        Err(response) => return response,
    };

    let event = ValidationEvent::new(usage_log_id, agent_id, body.score, body.label)
        .with_error_type(body.error_type)
        .with_explanation(body.explanation)
        .human();
    info!(usage_log_id = %event.usage_log_id, label = ?event.label, "Human override received");
    append(&state, event).await
}

async fn executing_agent(state: &AppState, usage_log_id: &RecordId) -> Result<AgentId, Response> {
    let record = state.router.telemetry().get(usage_log_id).await;
    match record {
        Some(record) if record.kind == TelemetryKind::Execution => record.agent_id.ok_or_else(|| {
            error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Record {} has no agent", usage_log_id),
            )
        }),
        Some(_) => Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Record {} is not an execution record", usage_log_id),
        )),
        None => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Execution record not found: {}", usage_log_id),
        )),
    }
}

async fn append(state: &AppState, event: ValidationEvent) -> Response {
    let usage_log_id = event.usage_log_id.clone();
    let status = match state.ledger.append(event).await {
        AppendOutcome::Appended => "appended",
        AppendOutcome::Duplicate => "duplicate",
    };
    let authoritative = state.ledger.authoritative(&usage_log_id).await;
    (
        StatusCode::OK,
        Json(ValidationAccepted {
            status,
            authoritative,
        }),
    )
        .into_response()
}
