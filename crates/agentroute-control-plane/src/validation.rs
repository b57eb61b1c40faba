//! Validation trigger: an outbox that hands successful executions to the
//! validation collaborator and feeds the verdicts into the ledger.
//!
//! Jobs are retried with exponential backoff (at-least-once). Every enqueue
//! hands back a [`ValidationTicket`] that resolves once the job settles, so
//! callers that care can await the verdict instead of polling for it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use agentroute_core::{
    AgentId, CanonicalTask, RecordId, RouteError, ValidationErrorType, ValidationEvent,
    ValidationLabel,
};

use crate::dispatcher::extract_error;
use crate::learning::{AppendOutcome, ValidationLedger};

/// Queue depth before enqueues are refused.
const OUTBOX_CAPACITY: usize = 1024;

/// Errors from the validation path. None of these reach a routing caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Validator request failed: {0}")]
    Transport(String),

    #[error("Validator returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Validator rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid validator response: {0}")]
    InvalidResponse(String),

    #[error("Validation is disabled")]
    Disabled,

    #[error("Validation outbox is full")]
    Backpressure,

    #[error("Timed out waiting for validation")]
    TimedOut,

    #[error("Validation job was dropped before completing")]
    Abandoned,
}

impl From<&ValidationError> for RouteError {
    fn from(e: &ValidationError) -> Self {
        RouteError::ValidationFailure(e.to_string())
    }
}

/// Request sent to the validation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub original_task_spec: CanonicalTask,
    pub agent_output: Value,
    pub agent_slug: String,
    pub usage_log_id: RecordId,
}

/// The collaborator's judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: f64,
    pub label: ValidationLabel,
    #[serde(default)]
    pub error_type: ValidationErrorType,
    #[serde(default)]
    pub explanation: String,
}

/// Whether the collaborator managed to persist its own copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageReport {
    #[serde(default)]
    pub attempted: bool,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of the validation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub success: bool,
    #[serde(default)]
    pub validation: Option<Verdict>,
    #[serde(default)]
    pub storage: Option<StorageReport>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The validation collaborator.
#[async_trait]
pub trait ValidationClient: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> Result<Verdict, ValidationError>;
}

/// Validation collaborator reached over HTTP.
pub struct HttpValidationClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpValidationClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ValidationClient for HttpValidationClient {
    async fn validate(&self, request: &ValidationRequest) -> Result<Verdict, ValidationError> {
        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ValidationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<Value> = response.json().await.ok();
            let detail = body
                .as_ref()
                .and_then(extract_error)
                .unwrap_or_else(|| status.to_string());
            return Err(ValidationError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body: ValidationResponse = response
            .json()
            .await
            .map_err(|e| ValidationError::InvalidResponse(e.to_string()))?;

        if let Some(storage) = &body.storage {
            if storage.attempted && !storage.success {
                warn!(
                    usage_log_id = %request.usage_log_id,
                    error = storage.error.as_deref().unwrap_or("unknown"),
                    "Validator could not store its result"
                );
            }
        }

        if !body.success {
            let reason = body
                .error
                .or_else(|| body.storage.and_then(|s| s.error))
                .unwrap_or_else(|| "validator reported failure".to_string());
            return Err(ValidationError::Rejected(reason));
        }

        body.validation
            .ok_or_else(|| ValidationError::InvalidResponse("missing validation".to_string()))
    }
}

/// Retry policy for validation jobs.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// A successful execution awaiting validation.
#[derive(Debug, Clone)]
pub struct ValidationJob {
    pub task: CanonicalTask,
    pub output: Value,
    pub agent_id: AgentId,
    pub agent_slug: String,
    pub usage_log_id: RecordId,
}

type Settlement = Result<ValidationEvent, ValidationError>;

struct Queued {
    job: ValidationJob,
    done: oneshot::Sender<Settlement>,
}

/// Completion signal of one validation job.
pub struct ValidationTicket {
    rx: oneshot::Receiver<Settlement>,
}

impl ValidationTicket {
    fn settled(result: Settlement) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Wait for the job to settle, at most `limit`.
    pub async fn wait(self, limit: Duration) -> Settlement {
        match tokio::time::timeout(limit, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ValidationError::Abandoned),
            Err(_) => Err(ValidationError::TimedOut),
        }
    }
}

/// Sending half of the outbox.
#[derive(Clone)]
pub struct ValidationOutbox {
    tx: Option<mpsc::Sender<Queued>>,
    pending: Arc<AtomicUsize>,
}

/// Receiving half of the outbox. Run it with [`OutboxWorker::run`].
pub struct OutboxWorker {
    rx: mpsc::Receiver<Queued>,
    client: Arc<dyn ValidationClient>,
    ledger: Arc<ValidationLedger>,
    policy: RetryPolicy,
    pending: Arc<AtomicUsize>,
}

impl ValidationOutbox {
    /// Create an outbox and the worker that drains it.
    pub fn new(
        client: Arc<dyn ValidationClient>,
        ledger: Arc<ValidationLedger>,
        policy: RetryPolicy,
    ) -> (Self, OutboxWorker) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let pending = Arc::new(AtomicUsize::new(0));
        let outbox = Self {
            tx: Some(tx),
            pending: pending.clone(),
        };
        let worker = OutboxWorker {
            rx,
            client,
            ledger,
            policy,
            pending,
        };
        (outbox, worker)
    }

    /// An outbox with no collaborator. Every ticket settles as disabled.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue `job` without waiting for it.
    pub fn enqueue(&self, job: ValidationJob) -> ValidationTicket {
        let Some(tx) = &self.tx else {
            return ValidationTicket::settled(Err(ValidationError::Disabled));
        };

        let usage_log_id = job.usage_log_id.clone();
        let (done, rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        match tx.try_send(Queued { job, done }) {
            Ok(()) => {
                debug!(usage_log_id = %usage_log_id, "Validation job queued");
                ValidationTicket { rx }
            }
            Err(e) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                let error = match e {
                    mpsc::error::TrySendError::Full(_) => ValidationError::Backpressure,
                    mpsc::error::TrySendError::Closed(_) => ValidationError::Abandoned,
                };
                warn!(
                    usage_log_id = %usage_log_id,
                    error = %RouteError::from(&error),
                    "Validation not queued"
                );
                ValidationTicket::settled(Err(error))
            }
        }
    }

    /// Jobs queued or in flight.
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl OutboxWorker {
    /// Drain the outbox until every sender is dropped. Each job runs on its
    /// own task so one job's backoff never delays another.
    pub async fn run(mut self) {
        info!("Validation outbox started");
        while let Some(queued) = self.rx.recv().await {
            let client = self.client.clone();
            let ledger = self.ledger.clone();
            let pending = self.pending.clone();
            let policy = self.policy;
            tokio::spawn(async move {
                let result = process(client.as_ref(), &ledger, policy, queued.job).await;
                pending.fetch_sub(1, Ordering::SeqCst);
                let _ = queued.done.send(result);
            });
        }
        info!("Validation outbox stopped");
    }
}

async fn process(
    client: &dyn ValidationClient,
    ledger: &ValidationLedger,
    policy: RetryPolicy,
    job: ValidationJob,
) -> Settlement {
    let request = ValidationRequest {
        original_task_spec: job.task,
        agent_output: job.output,
        agent_slug: job.agent_slug,
        usage_log_id: job.usage_log_id,
    };
    let attempts = policy.max_attempts.max(1);

    let mut attempt = 1;
    let verdict = loop {
        match client.validate(&request).await {
            Ok(verdict) => break verdict,
            Err(e) if attempt < attempts => {
                let delay = policy.backoff_after(attempt);
                warn!(
                    usage_log_id = %request.usage_log_id,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Validation attempt failed"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    usage_log_id = %request.usage_log_id,
                    attempts,
                    error = %RouteError::from(&e),
                    "Validation gave up"
                );
                return Err(e);
            }
        }
    };

    let event = ValidationEvent::new(
        request.usage_log_id,
        job.agent_id,
        verdict.score,
        verdict.label,
    )
    .with_error_type(verdict.error_type)
    .with_explanation(verdict.explanation);

    if ledger.append(event.clone()).await == AppendOutcome::Appended {
        info!(
            usage_log_id = %event.usage_log_id,
            agent_id = %event.agent_id,
            label = ?event.label,
            score = event.score,
            "Validation recorded"
        );
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    use axum::{routing::post, Json, Router};
    use serde_json::json;

    /// Fails the first `failures` calls, then passes.
    struct FlakyClient {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyClient {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ValidationClient for FlakyClient {
        async fn validate(&self, _request: &ValidationRequest) -> Result<Verdict, ValidationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(ValidationError::Transport("connection reset".into()));
            }
            Ok(Verdict {
                score: 0.9,
                label: ValidationLabel::Pass,
                error_type: ValidationErrorType::None,
                explanation: "looks right".into(),
            })
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(5),
        }
    }

    fn job(id: &str) -> ValidationJob {
        ValidationJob {
            task: CanonicalTask::new("EVENT_CREATION", "u1", "@u1"),
            output: json!({"success": true}),
            agent_id: AgentId::new("a1"),
            agent_slug: "agent-one".into(),
            usage_log_id: RecordId::new(id),
        }
    }

    fn spawn_outbox(client: Arc<dyn ValidationClient>) -> (ValidationOutbox, Arc<ValidationLedger>) {
        let ledger = Arc::new(ValidationLedger::new());
        let (outbox, worker) = ValidationOutbox::new(client, ledger.clone(), policy());
        tokio::spawn(worker.run());
        (outbox, ledger)
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_until_verdict() {
        let client = FlakyClient::new(2);
        let (outbox, ledger) = spawn_outbox(client.clone());

        let event = outbox
            .enqueue(job("r1"))
            .wait(Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(event.usage_log_id, RecordId::new("r1"));
        assert_eq!(event.label, ValidationLabel::Pass);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.len().await, 1);
        assert_eq!(outbox.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let client = FlakyClient::new(10);
        let (outbox, ledger) = spawn_outbox(client.clone());

        let result = outbox.enqueue(job("r1")).wait(Duration::from_secs(5)).await;

        assert!(matches!(result, Err(ValidationError::Transport(_))));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_redelivery_is_folded_once() {
        let (outbox, ledger) = spawn_outbox(FlakyClient::new(0));

        for _ in 0..2 {
            outbox
                .enqueue(job("r1"))
                .wait(Duration::from_secs(5))
                .await
                .unwrap();
        }

        assert_eq!(ledger.len().await, 1);
        assert_eq!(ledger.stats_for(&AgentId::new("a1")).await.validation_count, 1);
    }

    #[test]
    fn test_validation_errors_map_to_side_channel_kind() {
        let error = RouteError::from(&ValidationError::Backpressure);
        assert_eq!(error.kind(), agentroute_core::RouteErrorKind::ValidationFailure);
        assert!(!error.surfaces_to_caller());
        assert_eq!(error.to_string(), "Validation failed: Validation outbox is full");
    }

    #[tokio::test]
    async fn test_disabled_outbox_settles_immediately() {
        let outbox = ValidationOutbox::disabled();
        let result = outbox.enqueue(job("r1")).wait(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(ValidationError::Disabled)));
        assert_eq!(outbox.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_ticket_times_out() {
        struct Stuck;

        #[async_trait]
        impl ValidationClient for Stuck {
            async fn validate(&self, _r: &ValidationRequest) -> Result<Verdict, ValidationError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(ValidationError::TimedOut)
            }
        }

        let (outbox, _ledger) = spawn_outbox(Arc::new(Stuck));
        let result = outbox.enqueue(job("r1")).wait(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ValidationError::TimedOut)));
        assert_eq!(outbox.pending_count(), 1);
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> ValidationRequest {
        let job = job("r9");
        ValidationRequest {
            original_task_spec: job.task,
            agent_output: job.output,
            agent_slug: job.agent_slug,
            usage_log_id: job.usage_log_id,
        }
    }

    #[tokio::test]
    async fn test_http_client_parses_verdict() {
        let router = Router::new().route(
            "/validate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["usage_log_id"], json!("r9"));
                assert_eq!(body["original_task_spec"]["type"], json!("EVENT_CREATION"));
                Json(json!({
                    "success": true,
                    "validation": {
                        "score": 0.4,
                        "label": "FAIL",
                        "error_type": "wrong_action",
                        "explanation": "created a reminder"
                    },
                    "storage": {"attempted": true, "success": false, "error": "db down"}
                }))
            }),
        );
        let base = serve(router).await;
        let client = HttpValidationClient::new(format!("{base}/validate"), Duration::from_secs(2));

        let verdict = client.validate(&request()).await.unwrap();
        assert_eq!(verdict.label, ValidationLabel::Fail);
        assert_eq!(verdict.error_type, ValidationErrorType::WrongAction);
        assert_eq!(verdict.explanation, "created a reminder");
    }

    #[tokio::test]
    async fn test_http_client_reports_rejection() {
        let router = Router::new().route(
            "/validate",
            post(|| async { Json(json!({"success": false, "error": "unknown agent"})) }),
        );
        let base = serve(router).await;
        let client = HttpValidationClient::new(format!("{base}/validate"), Duration::from_secs(2));

        let result = client.validate(&request()).await;
        assert!(matches!(result, Err(ValidationError::Rejected(reason)) if reason == "unknown agent"));
    }
}
