//! HTTP request and response types.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};

use agentroute_core::{
    AgentDescriptor, AgentId, CapabilityDescriptor, CapabilitySnapshot, ExecutionMode, RecordId,
    ValidationErrorType, ValidationEvent, ValidationLabel,
};

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error response with its status code.
pub fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Agent types
// ============================================================================

/// An agent with its declared contract and current snapshot.
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    #[serde(flatten)]
    pub descriptor: AgentDescriptor,
    pub capabilities: CapabilityDescriptor,
    pub snapshot: CapabilitySnapshot,
}

/// Query of the ranking endpoint.
#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    pub task_type: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub domain: Option<String>,
}

// ============================================================================
// Validation types
// ============================================================================

/// Validator callback body.
#[derive(Debug, Deserialize)]
pub struct ValidationCallback {
    pub usage_log_id: RecordId,
    pub score: f64,
    pub label: ValidationLabel,
    #[serde(default)]
    pub error_type: ValidationErrorType,
    #[serde(default)]
    pub explanation: String,
}

/// Human override body.
#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub score: f64,
    pub label: ValidationLabel,
    #[serde(default)]
    pub error_type: ValidationErrorType,
    #[serde(default)]
    pub explanation: String,
}

/// Result of storing a validation event.
#[derive(Debug, Serialize)]
pub struct ValidationAccepted {
    /// `appended` or `duplicate`.
    pub status: &'static str,
    /// The event that now counts for the record.
    pub authoritative: Option<ValidationEvent>,
}

// ============================================================================
// Synthetic task types
// ============================================================================

/// Body of the synthetic enqueue endpoint.
#[derive(Debug, Deserialize)]
pub struct EnqueueSyntheticRequest {
    pub agent_id: AgentId,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}
