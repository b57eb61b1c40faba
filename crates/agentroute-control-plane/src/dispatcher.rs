//! Invocation dispatcher - executes an agent under a uniform contract.
//!
//! Whatever goes wrong inside a dispatch, the caller gets an
//! [`ExecutionOutcome`] back; nothing escapes as an error or a panic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use agentroute_core::{AgentDescriptor, AgentTask, ExecutionOutcome, InvocationMode, RouteError};

/// Failure reported by an in-process agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Failed(String),
}

/// An agent executed in-process.
#[async_trait]
pub trait InternalAgent: Send + Sync {
    /// Execute the agent. The returned body follows the HTTP contract:
    /// `{success: bool, ...payload}`.
    async fn execute(&self, task: AgentTask) -> Result<Value, AgentError>;
}

/// Returns the task it was given. Useful for smoke tests.
pub struct EchoAgent;

#[async_trait]
impl InternalAgent for EchoAgent {
    async fn execute(&self, task: AgentTask) -> Result<Value, AgentError> {
        Ok(json!({ "success": true, "echo": task.payload }))
    }
}

/// Named in-process execution targets.
#[derive(Default, Clone)]
pub struct InternalAgentRegistry {
    agents: HashMap<String, Arc<dyn InternalAgent>>,
}

impl InternalAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to register a target.
    pub fn with_agent(mut self, name: impl Into<String>, agent: Arc<dyn InternalAgent>) -> Self {
        self.agents.insert(name.into(), agent);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn InternalAgent>> {
        self.agents.get(name).cloned()
    }
}

/// Executes agents in-process or over HTTP.
#[derive(Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    internal: Arc<InternalAgentRegistry>,
    timeout: Duration,
}

impl Dispatcher {
    /// Create a new Dispatcher. `timeout` bounds every agent call.
    pub fn new(internal: InternalAgentRegistry, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            internal: Arc::new(internal),
            timeout,
        }
    }

    /// Invoke `agent` with `task`.
    pub async fn dispatch(&self, agent: &AgentDescriptor, task: &AgentTask) -> ExecutionOutcome {
        let started = Instant::now();

        let result = match agent.invocation.mode {
            InvocationMode::Internal => self.bounded(self.call_internal(agent, task)).await,
            InvocationMode::ExternalHttp => self.bounded(self.call_http(agent, task)).await,
            InvocationMode::Unrecognized => Err(RouteError::Configuration(format!(
                "agent '{}' has an unrecognized invocation mode",
                agent.slug
            ))),
        }
        .and_then(interpret_body);

        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(payload) => {
                info!(agent = %agent.slug, latency_ms, "Agent execution succeeded");
                ExecutionOutcome::succeeded(payload, latency_ms)
            }
            Err(error) => {
                warn!(agent = %agent.slug, latency_ms, error = %error, "Agent execution failed");
                ExecutionOutcome::failed(error, latency_ms)
            }
        }
    }

    async fn bounded<F>(&self, call: F) -> Result<Value, RouteError>
    where
        F: std::future::Future<Output = Result<Value, RouteError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RouteError::DispatchFailure(format!(
                "agent call timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    async fn call_internal(
        &self,
        agent: &AgentDescriptor,
        task: &AgentTask,
    ) -> Result<Value, RouteError> {
        let target = agent.invocation.target.as_deref().ok_or_else(|| {
            RouteError::Configuration(format!("agent '{}' has no internal target", agent.slug))
        })?;
        let handler = self.internal.get(target).ok_or_else(|| {
            RouteError::Configuration(format!("no internal target named '{}'", target))
        })?;

        debug!(agent = %agent.slug, target = %target, "Invoking internal agent");

        // Run on its own task so a panicking agent only takes down itself.
        let task = task.clone();
        match tokio::spawn(async move { handler.execute(task).await }).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(e)) => Err(RouteError::AgentReportedFailure(e.to_string())),
            Err(join) if join.is_panic() => Err(RouteError::DispatchFailure(format!(
                "internal agent '{}' panicked",
                target
            ))),
            Err(join) => Err(RouteError::DispatchFailure(join.to_string())),
        }
    }

    async fn call_http(
        &self,
        agent: &AgentDescriptor,
        task: &AgentTask,
    ) -> Result<Value, RouteError> {
        let invocation = &agent.invocation;
        let url = invocation.target.as_deref().ok_or_else(|| {
            RouteError::Configuration(format!("agent '{}' has no URL", agent.slug))
        })?;
        let method = invocation.method.as_deref().unwrap_or("POST");
        let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| {
                RouteError::Configuration(format!(
                    "agent '{}' has invalid HTTP method '{}'",
                    agent.slug, method
                ))
            })?;

        let parsed = reqwest::Url::parse(url).map_err(|e| {
            RouteError::Configuration(format!(
                "agent '{}' has invalid URL '{}': {}",
                agent.slug, url, e
            ))
        })?;
        let headers = header_map(&agent.slug, &invocation.headers)?;

        debug!(agent = %agent.slug, url = %url, method = %method, "Invoking HTTP agent");

        let request = self
            .http
            .request(method, parsed)
            .headers(headers)
            .json(&json!({ "task_spec": task.payload }));

        let response = request
            .send()
            .await
            .map_err(|e| RouteError::DispatchFailure(format!("request to {} failed: {}", url, e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RouteError::DispatchFailure(format!("failed to read response: {}", e)))?;
        let body = serde_json::from_str::<Value>(&text).ok();

        if !status.is_success() {
            let detail = body
                .as_ref()
                .and_then(extract_error)
                .or_else(|| non_empty(&text))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("no body").to_string());
            return Err(RouteError::DispatchFailure(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        Ok(body.unwrap_or(Value::String(text)))
    }
}

fn header_map(slug: &str, headers: &HashMap<String, String>) -> Result<HeaderMap, RouteError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let invalid = || {
            RouteError::Configuration(format!("agent '{}' has invalid header '{}'", slug, name))
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Turn an agent body into success or an agent-reported failure.
fn interpret_body(body: Value) -> Result<Value, RouteError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = extract_error(&body)
            .unwrap_or_else(|| "agent returned success=false without details".to_string());
        return Err(RouteError::AgentReportedFailure(reason));
    }
    Ok(body)
}

/// Best-effort error text from a JSON body: `error`, then `details`, then
/// `message`.
pub fn extract_error(body: &Value) -> Option<String> {
    ["error", "details", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(describe))
}

fn describe(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => non_empty(s),
        Value::Object(_) => value
            .get("message")
            .and_then(describe)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
