//! Learning aggregator: an append-only ledger of validation events and the
//! pure fold that turns it into learned agent statistics.
//!
//! The ledger is the only shared state written by concurrent validations.
//! Appends happen under one write lock and snapshots are recomputed from the
//! ledger, so two in-flight validations for the same agent can never
//! overwrite each other's signal.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use agentroute_core::{AgentId, RecordId, Trend, ValidationEvent, DEFAULT_SUCCESS_RATE};

/// Number of most recent validated records behind `recent_success_rate`.
pub const RECENT_WINDOW: usize = 20;

/// Validations needed before a trend is reported.
pub const TREND_MIN_VALIDATIONS: u64 = 10;

/// Difference between recent and lifetime rate that counts as movement.
pub const TREND_THRESHOLD: f64 = 0.05;

/// Result of appending an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Exact re-delivery of a judgement already in the ledger.
    Duplicate,
}

/// Statistics derived from an agent's validation history.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedStats {
    pub success_rate: f64,
    pub recent_success_rate: f64,
    pub average_validator_score: Option<f64>,
    pub validation_count: u64,
    pub trend: Option<Trend>,
}

impl Default for LearnedStats {
    fn default() -> Self {
        Self {
            success_rate: DEFAULT_SUCCESS_RATE,
            recent_success_rate: DEFAULT_SUCCESS_RATE,
            average_validator_score: None,
            validation_count: 0,
            trend: None,
        }
    }
}

#[derive(Default)]
struct LedgerInner {
    by_agent: HashMap<AgentId, Vec<ValidationEvent>>,
    record_owner: HashMap<RecordId, AgentId>,
    total: usize,
}

/// Append-only store of validation events.
#[derive(Default)]
pub struct ValidationLedger {
    inner: RwLock<LedgerInner>,
}

impl ValidationLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Re-deliveries of an identical judgement are dropped,
    /// which keeps the fold idempotent even for callers that retry.
    pub async fn append(&self, event: ValidationEvent) -> AppendOutcome {
        let mut inner = self.inner.write().await;
        let events = inner.by_agent.entry(event.agent_id.clone()).or_default();

        if events.iter().any(|e| e.same_judgement(&event)) {
            debug!(usage_log_id = %event.usage_log_id, "Duplicate validation event dropped");
            return AppendOutcome::Duplicate;
        }

        let usage_log_id = event.usage_log_id.clone();
        let agent_id = event.agent_id.clone();
        events.push(event);
        inner.record_owner.insert(usage_log_id, agent_id);
        inner.total += 1;
        AppendOutcome::Appended
    }

    /// Learned statistics for one agent.
    pub async fn stats_for(&self, agent_id: &AgentId) -> LearnedStats {
        let inner = self.inner.read().await;
        inner
            .by_agent
            .get(agent_id)
            .map(|events| fold(events))
            .unwrap_or_default()
    }

    /// The event that currently counts for a telemetry record.
    pub async fn authoritative(&self, usage_log_id: &RecordId) -> Option<ValidationEvent> {
        let inner = self.inner.read().await;
        let owner = inner.record_owner.get(usage_log_id)?;
        let events = inner.by_agent.get(owner)?;
        authoritative_events(events)
            .into_iter()
            .find(|e| &e.usage_log_id == usage_log_id)
            .cloned()
    }

    /// Total number of stored events.
    pub async fn len(&self) -> usize {
        self.inner.read().await.total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// One authoritative event per record id, in first-seen order.
///
/// The latest human event wins; without one, the latest machine event.
pub fn authoritative_events(events: &[ValidationEvent]) -> Vec<&ValidationEvent> {
    let mut order: Vec<&RecordId> = Vec::new();
    let mut latest: HashMap<&RecordId, (Option<&ValidationEvent>, Option<&ValidationEvent>)> =
        HashMap::new();

    for event in events {
        let slot = latest.entry(&event.usage_log_id).or_insert_with(|| {
            order.push(&event.usage_log_id);
            (None, None)
        });
        if event.is_human {
            slot.0 = Some(event);
        } else {
            slot.1 = Some(event);
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let (human, machine) = latest.get(id)?;
            (*human).or(*machine)
        })
        .collect()
}

/// Fold an agent's validation history into learned statistics.
///
/// Pure: the same events always yield the same stats, and replaying an event
/// that is already present changes nothing.
pub fn fold(events: &[ValidationEvent]) -> LearnedStats {
    let authoritative = authoritative_events(events);
    if authoritative.is_empty() {
        return LearnedStats::default();
    }

    let count = authoritative.len();
    let passes = authoritative.iter().filter(|e| e.label.is_success()).count();
    let success_rate = passes as f64 / count as f64;
    let average_validator_score =
        authoritative.iter().map(|e| e.score).sum::<f64>() / count as f64;

    let recent = &authoritative[count.saturating_sub(RECENT_WINDOW)..];
    let recent_passes = recent.iter().filter(|e| e.label.is_success()).count();
    let recent_success_rate = recent_passes as f64 / recent.len() as f64;

    let validation_count = count as u64;
    let trend = if validation_count < TREND_MIN_VALIDATIONS {
        None
    } else if recent_success_rate - success_rate > TREND_THRESHOLD {
        Some(Trend::Improving)
    } else if success_rate - recent_success_rate > TREND_THRESHOLD {
        Some(Trend::Declining)
    } else {
        Some(Trend::Stable)
    };

    LearnedStats {
        success_rate,
        recent_success_rate,
        average_validator_score: Some(average_validator_score),
        validation_count,
        trend,
    }
}
