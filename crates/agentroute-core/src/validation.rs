//! Validation events produced by the scoring collaborator or by humans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, RecordId};

/// Verdict on one agent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationLabel {
    Pass,
    Fail,
    NeedsReview,
}

impl ValidationLabel {
    /// Only PASS counts as a success for learning.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Classification of what went wrong, if anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorType {
    #[default]
    None,
    Hallucination,
    IncompleteOutput,
    FormatError,
    WrongAction,
    Timeout,
    #[serde(other)]
    Other,
}

/// One judgement of one execution. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationEvent {
    /// Execution telemetry record being judged.
    pub usage_log_id: RecordId,

    /// Agent that produced the judged output.
    pub agent_id: AgentId,

    /// Score in `[0, 1]`.
    pub score: f64,

    pub label: ValidationLabel,

    #[serde(default)]
    pub error_type: ValidationErrorType,

    #[serde(default)]
    pub explanation: String,

    /// Human overrides win over machine judgements of the same record.
    #[serde(default)]
    pub is_human: bool,

    pub recorded_at: DateTime<Utc>,
}

impl ValidationEvent {
    /// Create a machine validation event. The score is clamped into `[0, 1]`.
    pub fn new(
        usage_log_id: RecordId,
        agent_id: AgentId,
        score: f64,
        label: ValidationLabel,
    ) -> Self {
        Self {
            usage_log_id,
            agent_id,
            score: clamp_score(score),
            label,
            error_type: ValidationErrorType::None,
            explanation: String::new(),
            is_human: false,
            recorded_at: Utc::now(),
        }
    }

    /// Builder method to set the error classification.
    pub fn with_error_type(mut self, error_type: ValidationErrorType) -> Self {
        self.error_type = error_type;
        self
    }

    /// Builder method to set the explanation.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Builder method to mark the event as a human override.
    pub fn human(mut self) -> Self {
        self.is_human = true;
        self
    }

    /// Whether `other` is a re-delivery of this same judgement.
    pub fn same_judgement(&self, other: &ValidationEvent) -> bool {
        self.usage_log_id == other.usage_log_id
            && self.agent_id == other.agent_id
            && self.is_human == other.is_human
            && self.label == other.label
            && self.error_type == other.error_type
            && (self.score - other.score).abs() < f64::EPSILON
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_clamped() {
        let hi = ValidationEvent::new("r".into(), "a".into(), 1.7, ValidationLabel::Pass);
        let nan = ValidationEvent::new("r".into(), "a".into(), f64::NAN, ValidationLabel::Fail);
        assert_eq!(hi.score, 1.0);
        assert_eq!(nan.score, 0.0);
    }

    #[test]
    fn test_same_judgement_ignores_timestamp_and_explanation() {
        let a = ValidationEvent::new("r".into(), "a".into(), 0.9, ValidationLabel::Pass);
        let b = ValidationEvent::new("r".into(), "a".into(), 0.9, ValidationLabel::Pass)
            .with_explanation("looks right");
        assert!(a.same_judgement(&b));
        assert!(!a.same_judgement(&b.clone().human()));
    }

    #[test]
    fn test_unknown_error_type_maps_to_other() {
        let t: ValidationErrorType = serde_json::from_str("\"cosmic_ray\"").unwrap();
        assert_eq!(t, ValidationErrorType::Other);
    }
}
