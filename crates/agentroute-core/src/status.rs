//! Status enums for agents, routing modes and synthetic tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a registered agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    /// Serves production traffic.
    Active,
    /// Only receives synthetic evaluation traffic.
    #[default]
    Experimental,
    /// Never routed to.
    Disabled,
}

/// Which candidate pool a routing request draws from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Real requests; only ACTIVE agents are eligible.
    #[default]
    Production,
    /// Synthetic test traffic; only EXPERIMENTAL agents are eligible.
    Evaluation,
}

impl ExecutionMode {
    /// The single agent status eligible in this mode. The two pools are
    /// disjoint.
    pub fn eligible_status(&self) -> AgentStatus {
        match self {
            Self::Production => AgentStatus::Active,
            Self::Evaluation => AgentStatus::Experimental,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Evaluation => write!(f, "evaluation"),
        }
    }
}

/// Status of a synthetic evaluation task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyntheticTaskStatus {
    /// Created, waiting for batch pickup.
    #[default]
    Pending,
    /// Picked up by a batch and being driven through the pipeline.
    Running,
    /// Dispatched, recorded and (where required) validated.
    Completed,
    /// Some step failed; the reason is kept verbatim.
    Failed,
}

impl SyntheticTaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: SyntheticTaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for SyntheticTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Direction of an agent's recent performance relative to its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_pools_are_disjoint() {
        assert_ne!(
            ExecutionMode::Production.eligible_status(),
            ExecutionMode::Evaluation.eligible_status()
        );
    }

    #[test]
    fn test_terminal_states_have_no_successor() {
        use SyntheticTaskStatus::*;
        for from in [Completed, Failed] {
            for to in [Pending, Running, Completed, Failed] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_pending_only_moves_to_running() {
        use SyntheticTaskStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
    }
}
