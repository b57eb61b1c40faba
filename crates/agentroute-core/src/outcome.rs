//! Normalized result of invoking an agent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RouteError, RouteErrorKind};

/// Result of one dispatch. Produced exactly once per dispatch and never
/// carries an empty error string when `success` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,

    /// Wall-clock time of the agent call.
    pub latency_ms: u64,

    /// Agent response body on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// `error` without its kind prefix, as the agent or transport put it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RouteErrorKind>,
}

impl ExecutionOutcome {
    /// A successful outcome.
    pub fn succeeded(payload: Value, latency_ms: u64) -> Self {
        Self {
            success: true,
            latency_ms,
            payload: Some(payload),
            error: None,
            detail: None,
            error_kind: None,
        }
    }

    /// A failed outcome.
    pub fn failed(error: RouteError, latency_ms: u64) -> Self {
        let mut message = error.to_string();
        if message.trim().is_empty() {
            message = format!("{:?}", error.kind());
        }
        Self {
            success: false,
            latency_ms,
            payload: None,
            error: Some(message),
            detail: Some(error.detail()).filter(|d| !d.trim().is_empty()),
            error_kind: Some(error.kind()),
        }
    }

    /// Whether the agent itself answered. Only these outcomes say anything
    /// about the agent's latency.
    pub fn reached_agent(&self) -> bool {
        self.success || self.error_kind == Some(RouteErrorKind::AgentReportedFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_outcome_has_message_and_kind() {
        let outcome = ExecutionOutcome::failed(RouteError::DispatchFailure("timeout".into()), 12);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Dispatch failed: timeout"));
        assert_eq!(outcome.error_kind, Some(RouteErrorKind::DispatchFailure));
        assert_eq!(outcome.detail.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_only_agent_answers_count_as_reached() {
        assert!(ExecutionOutcome::succeeded(json!({}), 5).reached_agent());
        assert!(
            ExecutionOutcome::failed(RouteError::AgentReportedFailure("no".into()), 5)
                .reached_agent()
        );
        assert!(
            !ExecutionOutcome::failed(RouteError::Configuration("no target".into()), 0)
                .reached_agent()
        );
        assert!(
            !ExecutionOutcome::failed(RouteError::DispatchFailure("connection refused".into()), 1)
                .reached_agent()
        );
    }

    #[test]
    fn test_failed_outcome_never_has_empty_message() {
        let outcome = ExecutionOutcome::failed(RouteError::TransformationGap { fields: vec![] }, 0);
        assert!(!outcome.error.unwrap().trim().is_empty());
    }

    #[test]
    fn test_succeeded_outcome() {
        let outcome = ExecutionOutcome::succeeded(json!({"success": true}), 40);
        assert!(outcome.success);
        assert!(outcome.error.is_none());
    }
}
