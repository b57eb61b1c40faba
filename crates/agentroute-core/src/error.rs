//! Core domain errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ExecutionMode;

/// Core domain errors for agentroute.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Agent not found.
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failure taxonomy of the routing pipeline.
///
/// Only the kinds for which [`RouteError::surfaces_to_caller`] is true ever
/// turn a routing response into a failure. The rest are recorded and logged.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouteError {
    /// No eligible candidate for the task type in the requested mode.
    #[error("No {mode} agent can handle task type '{task_type}'")]
    NotRoutable {
        task_type: String,
        mode: ExecutionMode,
    },

    /// Missing or malformed invocation descriptor.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Custom mapping fields whose source path did not resolve.
    #[error("Unmapped fields: {}", fields.join(", "))]
    TransformationGap { fields: Vec<String> },

    /// Network error, timeout or non-2xx response.
    #[error("Dispatch failed: {0}")]
    DispatchFailure(String),

    /// The agent ran and reported `success: false`.
    #[error("Agent reported failure: {0}")]
    AgentReportedFailure(String),

    /// The validation collaborator could not be reached or answered badly.
    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    /// A telemetry write failed.
    #[error("Persistence failed: {0}")]
    PersistenceFailure(String),
}

impl RouteError {
    /// The serializable kind of this error.
    pub fn kind(&self) -> RouteErrorKind {
        match self {
            Self::NotRoutable { .. } => RouteErrorKind::NotRoutable,
            Self::Configuration(_) => RouteErrorKind::Configuration,
            Self::TransformationGap { .. } => RouteErrorKind::TransformationGap,
            Self::DispatchFailure(_) => RouteErrorKind::DispatchFailure,
            Self::AgentReportedFailure(_) => RouteErrorKind::AgentReportedFailure,
            Self::ValidationFailure(_) => RouteErrorKind::ValidationFailure,
            Self::PersistenceFailure(_) => RouteErrorKind::PersistenceFailure,
        }
    }

    /// Whether this error fails the caller's request.
    pub fn surfaces_to_caller(&self) -> bool {
        self.kind().surfaces_to_caller()
    }

    /// The underlying message without the kind prefix, e.g. the agent's own
    /// error text for [`RouteError::AgentReportedFailure`].
    pub fn detail(&self) -> String {
        match self {
            Self::Configuration(detail)
            | Self::DispatchFailure(detail)
            | Self::AgentReportedFailure(detail)
            | Self::ValidationFailure(detail)
            | Self::PersistenceFailure(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Wire form of [`RouteError`] kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteErrorKind {
    NotRoutable,
    Configuration,
    TransformationGap,
    DispatchFailure,
    AgentReportedFailure,
    ValidationFailure,
    PersistenceFailure,
}

impl RouteErrorKind {
    /// Whether errors of this kind fail the caller's request.
    pub fn surfaces_to_caller(&self) -> bool {
        matches!(
            self,
            Self::NotRoutable
                | Self::Configuration
                | Self::DispatchFailure
                | Self::AgentReportedFailure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_channel_errors_never_surface() {
        assert!(!RouteError::TransformationGap { fields: vec!["a".into()] }.surfaces_to_caller());
        assert!(!RouteError::ValidationFailure("x".into()).surfaces_to_caller());
        assert!(!RouteError::PersistenceFailure("x".into()).surfaces_to_caller());
    }

    #[test]
    fn test_primary_path_errors_surface() {
        let not_routable = RouteError::NotRoutable {
            task_type: "EVENT_CREATION".into(),
            mode: ExecutionMode::Production,
        };
        assert!(not_routable.surfaces_to_caller());
        assert_eq!(
            not_routable.to_string(),
            "No production agent can handle task type 'EVENT_CREATION'"
        );
        assert!(RouteError::Configuration("x".into()).surfaces_to_caller());
        assert!(RouteError::DispatchFailure("x".into()).surfaces_to_caller());
        assert!(RouteError::AgentReportedFailure("x".into()).surfaces_to_caller());
    }

    #[test]
    fn test_detail_drops_the_kind_prefix() {
        let reported = RouteError::AgentReportedFailure("calendar is read-only".into());
        assert_eq!(reported.detail(), "calendar is read-only");
        assert_eq!(reported.to_string(), "Agent reported failure: calendar is read-only");

        let gap = RouteError::TransformationGap { fields: vec!["a".into()] };
        assert_eq!(gap.detail(), "Unmapped fields: a");
    }
}
