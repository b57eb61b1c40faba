//! Candidate resolver - selects the agents eligible for a task.

use tracing::debug;

use agentroute_core::{AgentId, CapabilitySnapshot, ExecutionMode};

use crate::capability::{AgentRecord, CapabilityStore};

/// What the resolver filters on.
#[derive(Debug, Clone)]
pub struct CandidateQuery<'a> {
    pub task_type: &'a str,
    pub mode: ExecutionMode,
    /// Restrict the pool to this one agent.
    pub pinned_agent: Option<&'a AgentId>,
    /// Requester trust level, compared against `required_trust_threshold`.
    pub trust_level: Option<f64>,
}

impl<'a> CandidateQuery<'a> {
    pub fn new(task_type: &'a str, mode: ExecutionMode) -> Self {
        Self {
            task_type,
            mode,
            pinned_agent: None,
            trust_level: None,
        }
    }
}

/// An eligible agent with its current snapshot.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub record: AgentRecord,
    pub snapshot: CapabilitySnapshot,
}

/// Whether one agent is eligible for `query`.
pub fn is_eligible(record: &AgentRecord, query: &CandidateQuery<'_>) -> bool {
    let descriptor = &record.descriptor;

    if descriptor.status != query.mode.eligible_status() {
        return false;
    }
    if let Some(pinned) = query.pinned_agent {
        if &descriptor.id != pinned {
            return false;
        }
    }
    if !record
        .capabilities
        .supports(query.task_type, descriptor.domain.as_deref())
    {
        return false;
    }
    match (record.capabilities.required_trust_threshold, query.trust_level) {
        (Some(required), Some(trust)) => trust >= required,
        _ => true,
    }
}

/// Resolve eligible candidates, ordered by slug. An empty result means the
/// task is not routable in this mode.
pub async fn resolve(store: &CapabilityStore, query: &CandidateQuery<'_>) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for record in store.list().await {
        if !is_eligible(&record, query) {
            continue;
        }
        let snapshot = store.snapshot_of(&record).await;
        candidates.push(Candidate { record, snapshot });
    }

    debug!(
        task_type = %query.task_type,
        mode = %query.mode,
        candidates = candidates.len(),
        "Resolved candidates"
    );
    candidates
}
