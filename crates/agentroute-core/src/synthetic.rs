//! Synthetic evaluation tasks and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AgentId, CanonicalTask, CoreError, ExecutionOutcome, RecordId, SyntheticTaskId,
    SyntheticTaskStatus, ValidationEvent,
};

/// A manufactured task driven through the routing pipeline to evaluate an
/// EXPERIMENTAL agent.
///
/// `PENDING -> RUNNING -> {COMPLETED, FAILED}`. Terminal states reject every
/// further transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticTask {
    pub id: SyntheticTaskId,

    /// Agent under evaluation.
    pub agent_id: AgentId,

    pub task: CanonicalTask,

    pub status: SyntheticTaskStatus,

    /// Execution telemetry record, once located.
    pub usage_log_id: Option<RecordId>,

    pub outcome: Option<ExecutionOutcome>,

    pub validation: Option<ValidationEvent>,

    /// Failure reason, verbatim.
    pub failure: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyntheticTask {
    /// Create a new PENDING task.
    pub fn new(agent_id: AgentId, task: CanonicalTask) -> Self {
        Self {
            id: SyntheticTaskId::generate(),
            agent_id,
            task,
            status: SyntheticTaskStatus::Pending,
            usage_log_id: None,
            outcome: None,
            validation: None,
            failure: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark the task as picked up by a batch.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(SyntheticTaskStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the task as completed.
    pub fn complete(
        &mut self,
        usage_log_id: RecordId,
        outcome: ExecutionOutcome,
        validation: Option<ValidationEvent>,
    ) -> Result<(), CoreError> {
        self.transition(SyntheticTaskStatus::Completed)?;
        self.usage_log_id = Some(usage_log_id);
        self.outcome = Some(outcome);
        self.validation = validation;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the task as failed, keeping the reason verbatim.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        self.transition(SyntheticTaskStatus::Failed)?;
        self.failure = Some(reason.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Attach the dispatch outcome without changing state.
    pub fn record_outcome(&mut self, usage_log_id: Option<RecordId>, outcome: ExecutionOutcome) {
        self.usage_log_id = usage_log_id;
        self.outcome = Some(outcome);
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: SyntheticTaskStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> SyntheticTask {
        SyntheticTask::new(
            AgentId::new("agent-1"),
            CanonicalTask::new("EVENT_CREATION", "synthetic", "@synthetic"),
        )
    }

    #[test]
    fn test_happy_path() {
        let mut t = task();
        t.start().unwrap();
        assert!(t.started_at.is_some());
        t.complete(
            RecordId::new("rec-1"),
            ExecutionOutcome::succeeded(json!({}), 5),
            None,
        )
        .unwrap();
        assert_eq!(t.status, SyntheticTaskStatus::Completed);
        assert!(t.is_terminal());
    }

    #[test]
    fn test_cannot_complete_from_pending() {
        let mut t = task();
        let err = t
            .complete(RecordId::new("r"), ExecutionOutcome::succeeded(json!({}), 1), None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
        assert_eq!(t.status, SyntheticTaskStatus::Pending);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut t = task();
        t.start().unwrap();
        t.fail("agent said no").unwrap();

        assert!(t.start().is_err());
        assert!(t.fail("again").is_err());
        assert!(t
            .complete(RecordId::new("r"), ExecutionOutcome::succeeded(json!({}), 1), None)
            .is_err());
        assert_eq!(t.status, SyntheticTaskStatus::Failed);
        assert_eq!(t.failure.as_deref(), Some("agent said no"));
    }
}
