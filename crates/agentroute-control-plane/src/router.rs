//! Task router: resolve, rank, transform, dispatch and record one task.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use agentroute_core::{
    AgentId, CanonicalTask, ExecutionMode, ExecutionOutcome, RecordId, RouteError,
    RouteErrorKind, RoutingDecision,
};

use crate::capability::CapabilityStore;
use crate::dispatcher::Dispatcher;
use crate::ranking::{rank, RankingWeights};
use crate::resolver::{resolve, CandidateQuery};
use crate::telemetry::{TelemetryRecord, TelemetryRecorder};
use crate::transform::transform;
use crate::validation::{ValidationJob, ValidationOutbox, ValidationTicket};

/// Context key holding the requester's trust level.
const TRUST_LEVEL_KEY: &str = "trust_level";

/// A task to route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub task: CanonicalTask,

    #[serde(default)]
    pub mode: ExecutionMode,

    /// Target domain, used for the domain-match bonus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Restrict routing to this agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_agent: Option<AgentId>,
}

impl RouteRequest {
    pub fn new(task: CanonicalTask) -> Self {
        Self {
            task,
            mode: ExecutionMode::Production,
            domain: None,
            pinned_agent: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn pinned_to(mut self, agent_id: AgentId) -> Self {
        self.pinned_agent = Some(agent_id);
        self
    }
}

/// Result of routing one task, as returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub success: bool,
    pub task_type: String,

    /// Candidate slugs, best first.
    pub candidates: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_agent_id: Option<AgentId>,

    pub decision: RoutingDecision,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RouteErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    /// Execution telemetry record id; validation events are keyed by it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_log_id: Option<RecordId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_record_id: Option<RecordId>,

    /// Custom mapping targets that could not be filled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmapped_fields: Vec<String>,
}

impl RouteResponse {
    fn not_routable(decision: RoutingDecision, routing_record_id: Option<RecordId>) -> Self {
        let error = RouteError::NotRoutable {
            task_type: decision.task_type.clone(),
            mode: decision.mode,
        };
        Self {
            success: false,
            task_type: decision.task_type.clone(),
            candidates: Vec::new(),
            selected_agent: None,
            selected_agent_id: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            decision,
            output: None,
            latency_ms: None,
            usage_log_id: None,
            routing_record_id,
            unmapped_fields: Vec::new(),
        }
    }
}

/// A routed task plus the completion signal of its validation, if one was
/// queued.
pub struct Routed {
    pub response: RouteResponse,
    pub outcome: Option<ExecutionOutcome>,
    pub validation: Option<ValidationTicket>,
}

/// Runs the routing pipeline.
#[derive(Clone)]
pub struct TaskRouter {
    store: Arc<CapabilityStore>,
    dispatcher: Dispatcher,
    telemetry: TelemetryRecorder,
    outbox: ValidationOutbox,
    weights: RankingWeights,
}

impl TaskRouter {
    pub fn new(
        store: Arc<CapabilityStore>,
        dispatcher: Dispatcher,
        telemetry: TelemetryRecorder,
        outbox: ValidationOutbox,
        weights: RankingWeights,
    ) -> Self {
        Self {
            store,
            dispatcher,
            telemetry,
            outbox,
            weights,
        }
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn outbox(&self) -> &ValidationOutbox {
        &self.outbox
    }

    /// Score the candidates for a task type without dispatching.
    pub async fn decide(
        &self,
        task_type: &str,
        mode: ExecutionMode,
        domain: Option<&str>,
    ) -> RoutingDecision {
        let candidates = resolve(&self.store, &CandidateQuery::new(task_type, mode)).await;
        RoutingDecision::from_ranking(task_type, mode, rank(&candidates, domain, &self.weights))
    }

    /// Route one task end to end.
    ///
    /// Never fails: every problem is reported through the response.
    pub async fn route(&self, request: RouteRequest) -> Routed {
        let task = &request.task;
        let trust_level = task
            .context
            .as_ref()
            .and_then(|c| c.get(TRUST_LEVEL_KEY))
            .and_then(Value::as_f64);
        let query = CandidateQuery {
            task_type: &task.task_type,
            mode: request.mode,
            pinned_agent: request.pinned_agent.as_ref(),
            trust_level,
        };

        let candidates = resolve(&self.store, &query).await;
        let ranked = rank(&candidates, request.domain.as_deref(), &self.weights);
        let decision = RoutingDecision::from_ranking(task.task_type.clone(), request.mode, ranked);
        let routing_record_id = self.telemetry.record(TelemetryRecord::routing(&decision)).await;

        info!(
            task_type = %task.task_type,
            mode = %request.mode,
            reasoning = %decision.reasoning,
            "Routing decision"
        );

        let Some(selected) = decision.selected.clone() else {
            return Routed {
                response: RouteResponse::not_routable(decision, routing_record_id),
                outcome: None,
                validation: None,
            };
        };
        let Some(agent) = candidates.into_iter().find(|c| c.record.descriptor.id == selected)
        else {
            // The ranking only ever contains resolved candidates.
            return Routed {
                response: RouteResponse::not_routable(decision, routing_record_id),
                outcome: None,
                validation: None,
            };
        };
        let descriptor = agent.record.descriptor;

        let transformed = transform(task, &agent.record.capabilities);
        let unmapped_fields = transformed.trace.unmapped();
        if let Some(gap) = transformed.trace.gap() {
            warn!(agent = %descriptor.slug, error = %gap, "Transformation gap");
        }

        let outcome = self.dispatcher.dispatch(&descriptor, &transformed.task).await;
        if outcome.reached_agent() {
            self.store
                .record_latency(&descriptor.id, outcome.latency_ms)
                .await;
        }

        let usage_log_id = self
            .telemetry
            .record(TelemetryRecord::execution(
                task.task_type.clone(),
                descriptor.id.clone(),
                request.mode,
                &outcome,
                transformed.trace,
                routing_record_id.clone(),
            ))
            .await;

        let validation = match (&usage_log_id, outcome.success, descriptor.is_validator) {
            (Some(usage_log_id), true, false) => Some(self.outbox.enqueue(ValidationJob {
                task: task.clone(),
                output: outcome.payload.clone().unwrap_or(Value::Null),
                agent_id: descriptor.id.clone(),
                agent_slug: descriptor.slug.clone(),
                usage_log_id: usage_log_id.clone(),
            })),
            (None, true, false) => {
                let error = RouteError::ValidationFailure(
                    "no execution record to validate against".to_string(),
                );
                warn!(agent = %descriptor.slug, error = %error, "Validation skipped");
                None
            }
            _ => None,
        };

        let response = RouteResponse {
            success: outcome.success,
            task_type: task.task_type.clone(),
            candidates: decision.candidate_slugs(),
            selected_agent: Some(descriptor.slug),
            selected_agent_id: Some(descriptor.id),
            decision,
            output: outcome.payload.clone(),
            error: outcome.error.clone(),
            error_kind: outcome.error_kind,
            latency_ms: Some(outcome.latency_ms),
            usage_log_id,
            routing_record_id,
            unmapped_fields,
        };

        Routed {
            response,
            outcome: Some(outcome),
            validation,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use agentroute_core::{
        AgentDescriptor, AgentStatus, CapabilityDescriptor, InvocationDescriptor,
        ValidationLabel,
    };

    use crate::dispatcher::{AgentError, EchoAgent, InternalAgent, InternalAgentRegistry};
    use crate::learning::ValidationLedger;
    use crate::telemetry::TelemetryKind;
    use crate::validation::{
        RetryPolicy, ValidationClient, ValidationError, ValidationRequest, Verdict,
    };

    struct Refusing;

    #[async_trait]
    impl InternalAgent for Refusing {
        async fn execute(&self, _task: agentroute_core::AgentTask) -> Result<Value, AgentError> {
            Ok(json!({"success": false, "error": "calendar is read-only"}))
        }
    }

    pub(crate) struct PassingValidator;

    #[async_trait]
    impl ValidationClient for PassingValidator {
        async fn validate(&self, _r: &ValidationRequest) -> Result<Verdict, ValidationError> {
            Ok(Verdict {
                score: 1.0,
                label: ValidationLabel::Pass,
                error_type: Default::default(),
                explanation: String::new(),
            })
        }
    }

    pub(crate) fn registry() -> InternalAgentRegistry {
        InternalAgentRegistry::new()
            .with_agent("echo", Arc::new(EchoAgent))
            .with_agent("refusing", Arc::new(Refusing))
    }

    pub(crate) fn capabilities(task_type: &str) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supported_task_types: vec![task_type.to_string()],
            ..Default::default()
        }
    }

    pub(crate) fn harness() -> (TaskRouter, Arc<CapabilityStore>) {
        let ledger = Arc::new(ValidationLedger::new());
        let store = Arc::new(CapabilityStore::new(ledger.clone()));
        let (outbox, worker) = ValidationOutbox::new(
            Arc::new(PassingValidator),
            ledger,
            RetryPolicy::default(),
        );
        tokio::spawn(worker.run());
        let router = TaskRouter::new(
            store.clone(),
            Dispatcher::new(registry(), Duration::from_secs(2)),
            TelemetryRecorder::in_memory(),
            outbox,
            RankingWeights::default(),
        );
        (router, store)
    }

    fn task() -> CanonicalTask {
        CanonicalTask::new("EVENT_CREATION", "u1", "@u1").with_raw_message("lunch friday")
    }

    #[tokio::test]
    async fn test_not_routable_writes_no_execution() {
        let (router, _store) = harness();
        let routed = router.route(RouteRequest::new(task())).await;

        assert!(!routed.response.success);
        assert_eq!(routed.response.error_kind, Some(RouteErrorKind::NotRoutable));
        assert!(routed.response.usage_log_id.is_none());
        assert!(routed.outcome.is_none());
        assert_eq!(router.telemetry().count().await, 1);

        let routing = router
            .telemetry()
            .get(routed.response.routing_record_id.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(routing.kind, TelemetryKind::Routing);
    }

    #[tokio::test]
    async fn test_success_records_both_and_validates() {
        let (router, store) = harness();
        store
            .register(
                AgentDescriptor::new("a1", "echo", AgentStatus::Active, InvocationDescriptor::internal("echo")),
                capabilities("EVENT_CREATION"),
            )
            .await;

        let routed = router.route(RouteRequest::new(task())).await;
        let response = &routed.response;
        assert!(response.success);
        assert_eq!(response.selected_agent.as_deref(), Some("echo"));
        assert_eq!(response.candidates, vec!["echo".to_string()]);

        let usage_log_id = response.usage_log_id.clone().unwrap();
        let execution = router.telemetry().get(&usage_log_id).await.unwrap();
        assert_eq!(execution.agent_id, Some(AgentId::new("a1")));
        assert_eq!(execution.routing_record_id, response.routing_record_id);
        assert_eq!(router.telemetry().count().await, 2);

        let event = routed
            .validation
            .unwrap()
            .wait(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(event.usage_log_id, usage_log_id);

        let snapshot = store.snapshot(&AgentId::new("a1")).await.unwrap();
        assert_eq!(snapshot.validation_count, 1);
        assert!(snapshot.average_latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_agent_failure_surfaces_and_skips_validation() {
        let (router, store) = harness();
        store
            .register(
                AgentDescriptor::new("a1", "refusing", AgentStatus::Active, InvocationDescriptor::internal("refusing")),
                capabilities("EVENT_CREATION"),
            )
            .await;

        let routed = router.route(RouteRequest::new(task())).await;
        assert!(!routed.response.success);
        assert_eq!(
            routed.response.error_kind,
            Some(RouteErrorKind::AgentReportedFailure)
        );
        assert!(routed.response.error.unwrap().contains("calendar is read-only"));
        assert!(routed.validation.is_none());
        assert_eq!(router.telemetry().count().await, 2);
    }

    #[tokio::test]
    async fn test_broken_agents_record_no_latency() {
        let (router, store) = harness();
        store
            .register(
                AgentDescriptor::new("a1", "orphan", AgentStatus::Active, InvocationDescriptor::internal("missing")),
                capabilities("EVENT_CREATION"),
            )
            .await;

        let routed = router.route(RouteRequest::new(task())).await;
        assert_eq!(routed.response.error_kind, Some(RouteErrorKind::Configuration));
        let snapshot = store.snapshot(&AgentId::new("a1")).await.unwrap();
        assert!(snapshot.average_latency_ms.is_none());
    }

    #[tokio::test]
    async fn test_agent_failures_still_record_latency() {
        let (router, store) = harness();
        store
            .register(
                AgentDescriptor::new("a1", "refusing", AgentStatus::Active, InvocationDescriptor::internal("refusing")),
                capabilities("EVENT_CREATION"),
            )
            .await;

        router.route(RouteRequest::new(task())).await;
        let snapshot = store.snapshot(&AgentId::new("a1")).await.unwrap();
        assert!(snapshot.average_latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_validator_agents_are_not_validated() {
        let (router, store) = harness();
        store
            .register(
                AgentDescriptor::new("v1", "judge", AgentStatus::Active, InvocationDescriptor::internal("echo"))
                    .as_validator(),
                capabilities("EVENT_CREATION"),
            )
            .await;

        let routed = router.route(RouteRequest::new(task())).await;
        assert!(routed.response.success);
        assert!(routed.validation.is_none());
    }

    #[tokio::test]
    async fn test_modes_use_disjoint_pools() {
        let (router, store) = harness();
        store
            .register(
                AgentDescriptor::new("a1", "stable", AgentStatus::Active, InvocationDescriptor::internal("echo")),
                capabilities("EVENT_CREATION"),
            )
            .await;
        store
            .register(
                AgentDescriptor::new("a2", "trial", AgentStatus::Experimental, InvocationDescriptor::internal("echo")),
                capabilities("EVENT_CREATION"),
            )
            .await;

        let production = router.route(RouteRequest::new(task())).await;
        assert_eq!(production.response.selected_agent.as_deref(), Some("stable"));

        let evaluation = router
            .route(RouteRequest::new(task()).with_mode(ExecutionMode::Evaluation))
            .await;
        assert_eq!(evaluation.response.selected_agent.as_deref(), Some("trial"));
        assert_eq!(evaluation.response.candidates, vec!["trial".to_string()]);
    }

    #[tokio::test]
    async fn test_decide_does_not_dispatch() {
        let (router, store) = harness();
        store
            .register(
                AgentDescriptor::new("a1", "echo", AgentStatus::Active, InvocationDescriptor::internal("echo")),
                capabilities("EVENT_CREATION"),
            )
            .await;

        let decision = router
            .decide("EVENT_CREATION", ExecutionMode::Production, None)
            .await;
        assert_eq!(decision.selected, Some(AgentId::new("a1")));
        assert_eq!(router.telemetry().count().await, 0);
    }
}
