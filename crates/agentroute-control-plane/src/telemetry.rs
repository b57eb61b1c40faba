//! Telemetry recorder: immutable routing and execution records.
//!
//! Writes are best-effort. A failing sink is logged as a
//! [`RouteError::PersistenceFailure`] and never reaches the caller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use agentroute_core::{
    AgentId, ExecutionMode, ExecutionOutcome, RecordId, RouteError, RouteErrorKind,
    RoutingDecision,
};

use crate::transform::TransformationTrace;

/// Task type stamped on routing-decision records.
pub const ROUTING_TASK_TYPE: &str = "ROUTING";

/// Errors raised by a telemetry sink.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry sink unavailable: {0}")]
    Unavailable(String),

    #[error("Telemetry write rejected: {0}")]
    Rejected(String),
}

impl From<TelemetryError> for RouteError {
    fn from(e: TelemetryError) -> Self {
        RouteError::PersistenceFailure(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    Routing,
    Execution,
}

/// One telemetry row. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: RecordId,
    pub kind: TelemetryKind,

    /// `ROUTING` for decision records, the routed task type otherwise.
    pub task_type: String,

    /// Executing agent. Absent on routing records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,

    pub mode: ExecutionMode,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RouteErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<RoutingDecision>,

    /// Routing record this execution belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_record_id: Option<RecordId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<TransformationTrace>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl TelemetryRecord {
    /// Record for a routing decision, routable or not.
    pub fn routing(decision: &RoutingDecision) -> Self {
        let routable = decision.selected.is_some();
        Self {
            id: RecordId::generate(),
            kind: TelemetryKind::Routing,
            task_type: ROUTING_TASK_TYPE.to_string(),
            agent_id: None,
            mode: decision.mode,
            success: routable,
            latency_ms: None,
            error: (!routable).then(|| decision.reasoning.clone()),
            error_kind: (!routable).then_some(RouteErrorKind::NotRoutable),
            decision: Some(decision.clone()),
            routing_record_id: None,
            transformation: None,
            output: None,
            created_at: Utc::now(),
        }
    }

    /// Record for one agent execution.
    pub fn execution(
        task_type: impl Into<String>,
        agent_id: AgentId,
        mode: ExecutionMode,
        outcome: &ExecutionOutcome,
        transformation: TransformationTrace,
        routing_record_id: Option<RecordId>,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            kind: TelemetryKind::Execution,
            task_type: task_type.into(),
            agent_id: Some(agent_id),
            mode,
            success: outcome.success,
            latency_ms: Some(outcome.latency_ms),
            error: outcome.error.clone(),
            error_kind: outcome.error_kind,
            decision: None,
            routing_record_id,
            transformation: Some(transformation),
            output: outcome.payload.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Storage behind the recorder.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn write(&self, record: TelemetryRecord) -> Result<(), TelemetryError>;

    async fn get(&self, id: &RecordId) -> Result<Option<TelemetryRecord>, TelemetryError>;

    async fn count(&self) -> Result<usize, TelemetryError>;
}

/// Process-local sink.
#[derive(Default)]
pub struct InMemoryTelemetry {
    records: RwLock<HashMap<RecordId, TelemetryRecord>>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TelemetrySink for InMemoryTelemetry {
    async fn write(&self, record: TelemetryRecord) -> Result<(), TelemetryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(TelemetryError::Rejected(format!(
                "record {} already exists",
                record.id
            )));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &RecordId) -> Result<Option<TelemetryRecord>, TelemetryError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn count(&self) -> Result<usize, TelemetryError> {
        Ok(self.records.read().await.len())
    }
}

/// Best-effort front of a [`TelemetrySink`].
#[derive(Clone)]
pub struct TelemetryRecorder {
    sink: Arc<dyn TelemetrySink>,
}

impl TelemetryRecorder {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    /// Recorder over an [`InMemoryTelemetry`] sink.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTelemetry::new()))
    }

    /// Write `record`, returning its id when the write landed.
    pub async fn record(&self, record: TelemetryRecord) -> Option<RecordId> {
        let id = record.id.clone();
        let kind = record.kind;
        match self.sink.write(record).await {
            Ok(()) => {
                debug!(record_id = %id, kind = ?kind, "Telemetry record written");
                Some(id)
            }
            Err(e) => {
                warn!(kind = ?kind, error = %RouteError::from(e), "Telemetry write failed");
                None
            }
        }
    }

    pub async fn get(&self, id: &RecordId) -> Option<TelemetryRecord> {
        match self.sink.get(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(record_id = %id, error = %e, "Telemetry lookup failed");
                None
            }
        }
    }

    pub async fn count(&self) -> usize {
        self.sink.count().await.unwrap_or_else(|e| {
            warn!(error = %e, "Telemetry count failed");
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenSink;

    #[async_trait]
    impl TelemetrySink for BrokenSink {
        async fn write(&self, _record: TelemetryRecord) -> Result<(), TelemetryError> {
            Err(TelemetryError::Unavailable("disk full".into()))
        }

        async fn get(&self, _id: &RecordId) -> Result<Option<TelemetryRecord>, TelemetryError> {
            Err(TelemetryError::Unavailable("disk full".into()))
        }

        async fn count(&self) -> Result<usize, TelemetryError> {
            Err(TelemetryError::Unavailable("disk full".into()))
        }
    }

    fn empty_decision() -> RoutingDecision {
        RoutingDecision::from_ranking("EVENT_CREATION", ExecutionMode::Production, Vec::new())
    }

    fn trace() -> TransformationTrace {
        TransformationTrace {
            format: "standard".into(),
            applied: false,
            short_circuited: false,
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_routing_record_has_no_agent() {
        let record = TelemetryRecord::routing(&empty_decision());
        assert_eq!(record.task_type, ROUTING_TASK_TYPE);
        assert!(record.agent_id.is_none());
        assert!(!record.success);
        assert_eq!(record.error_kind, Some(RouteErrorKind::NotRoutable));
    }

    #[test]
    fn test_execution_record_copies_outcome() {
        let outcome = ExecutionOutcome::failed(RouteError::DispatchFailure("HTTP 502".into()), 40);
        let routing_id = RecordId::generate();
        let record = TelemetryRecord::execution(
            "EVENT_CREATION",
            AgentId::new("a1"),
            ExecutionMode::Production,
            &outcome,
            trace(),
            Some(routing_id.clone()),
        );
        assert_eq!(record.agent_id, Some(AgentId::new("a1")));
        assert_eq!(record.latency_ms, Some(40));
        assert_eq!(record.error.as_deref(), Some("Dispatch failed: HTTP 502"));
        assert_eq!(record.routing_record_id, Some(routing_id));
        assert!(record.transformation.is_some());
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let recorder = TelemetryRecorder::in_memory();
        let outcome = ExecutionOutcome::succeeded(json!({"success": true}), 12);
        let record = TelemetryRecord::execution(
            "EVENT_CREATION",
            AgentId::new("a1"),
            ExecutionMode::Evaluation,
            &outcome,
            trace(),
            None,
        );

        let id = recorder.record(record.clone()).await.unwrap();
        assert_eq!(recorder.get(&id).await, Some(record));
        assert_eq!(recorder.count().await, 1);
    }

    #[tokio::test]
    async fn test_sink_failures_are_swallowed() {
        let recorder = TelemetryRecorder::new(Arc::new(BrokenSink));
        assert!(recorder
            .record(TelemetryRecord::routing(&empty_decision()))
            .await
            .is_none());
        assert!(recorder.get(&RecordId::generate()).await.is_none());
        assert_eq!(recorder.count().await, 0);
    }

    #[test]
    fn test_sink_error_is_a_persistence_failure() {
        let error = RouteError::from(TelemetryError::Unavailable("disk full".into()));
        assert_eq!(error.kind(), RouteErrorKind::PersistenceFailure);
        assert!(!error.surfaces_to_caller());
        assert_eq!(
            error.to_string(),
            "Persistence failed: Telemetry sink unavailable: disk full"
        );
    }
}
