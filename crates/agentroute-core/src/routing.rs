//! Routing decisions and their score breakdowns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, ExecutionMode};

/// Per-term contribution to a candidate's score. Terms are raw inputs, not
/// weighted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Recent success rate.
    pub recent: f64,
    /// Lifetime success rate.
    pub global: f64,
    /// Average validator score, or the lifetime rate when none.
    pub validator: f64,
    /// Latency term in `[0, 1]`.
    pub latency: f64,
    /// 1 when the agent has too few validations, else 0.
    pub newness: f64,
    /// Domain match term, present only when a target domain was requested.
    pub domain: Option<f64>,
    /// Weighted total.
    pub total: f64,
}

/// A scored candidate, in ranked position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub agent_id: AgentId,
    pub slug: String,
    pub validation_count: u64,
    pub average_latency_ms: Option<f64>,
    pub breakdown: ScoreBreakdown,
}

impl RankedCandidate {
    pub fn score(&self) -> f64 {
        self.breakdown.total
    }
}

/// Immutable audit record of one routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub task_type: String,
    pub mode: ExecutionMode,

    /// Every candidate considered, best first.
    pub candidates: Vec<RankedCandidate>,

    /// Primary route; `None` when nothing was routable.
    pub selected: Option<AgentId>,

    /// Human-readable trace, kept verbatim.
    pub reasoning: String,

    pub decided_at: DateTime<Utc>,
}

impl RoutingDecision {
    /// Build the decision for a ranked candidate list. The head of the list
    /// becomes the primary route.
    pub fn from_ranking(
        task_type: impl Into<String>,
        mode: ExecutionMode,
        candidates: Vec<RankedCandidate>,
    ) -> Self {
        let task_type = task_type.into();
        let reasoning = match candidates.first() {
            Some(top) => format!(
                "{} candidate(s) for {} ({}); selected {} with score {:.3}",
                candidates.len(),
                task_type,
                mode,
                top.slug,
                top.score()
            ),
            None => format!("0 candidates for {} ({}); not routable", task_type, mode),
        };
        Self {
            selected: candidates.first().map(|c| c.agent_id.clone()),
            task_type,
            mode,
            candidates,
            reasoning,
            decided_at: Utc::now(),
        }
    }

    /// The selected candidate, if any.
    pub fn primary(&self) -> Option<&RankedCandidate> {
        self.candidates.first()
    }

    /// Slugs of all candidates in ranked order.
    pub fn candidate_slugs(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.slug.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(slug: &str, total: f64) -> RankedCandidate {
        RankedCandidate {
            agent_id: AgentId::new(slug),
            slug: slug.to_string(),
            validation_count: 0,
            average_latency_ms: None,
            breakdown: ScoreBreakdown {
                recent: 0.5,
                global: 0.5,
                validator: 0.5,
                latency: 0.5,
                newness: 1.0,
                domain: None,
                total,
            },
        }
    }

    #[test]
    fn test_decision_selects_head() {
        let decision = RoutingDecision::from_ranking(
            "EVENT_CREATION",
            ExecutionMode::Production,
            vec![candidate("a", 0.8), candidate("b", 0.6)],
        );
        assert_eq!(decision.selected, Some(AgentId::new("a")));
        assert_eq!(
            decision.reasoning,
            "2 candidate(s) for EVENT_CREATION (production); selected a with score 0.800"
        );
    }

    #[test]
    fn test_empty_decision() {
        let decision =
            RoutingDecision::from_ranking("X", ExecutionMode::Evaluation, Vec::new());
        assert!(decision.selected.is_none());
        assert!(decision.reasoning.contains("not routable"));
    }
}
