//! Synthetic task orchestrator - evaluates EXPERIMENTAL agents by driving
//! manufactured tasks through the routing pipeline.
//!
//! Batches run sequentially, and never overlap, so an untested agent sees
//! one task at a time.
//! A task completes only when its execution record is found and, for
//! non-validator agents, its validation event has arrived.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use agentroute_core::{
    AgentId, AgentStatus, CanonicalTask, CoreError, ExecutionMode, ExecutionOutcome, RecordId,
    SyntheticTask, SyntheticTaskId, SyntheticTaskStatus, Urgency, ValidationEvent, GOAL_PLANNING,
};

use crate::capability::CapabilityStore;
use crate::router::{RouteRequest, TaskRouter};

/// Source tag on every synthetic task.
pub const SYNTHETIC_SOURCE: &str = "synthetic";

/// Default cap on tasks created by one enqueue call.
pub const DEFAULT_MAX_ENQUEUE: usize = 100;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Agent '{0}' is not EXPERIMENTAL")]
    NotExperimental(String),

    #[error("Agent '{0}' declares no task types")]
    NoTaskTypes(String),
}

/// Manufactures deterministic canonical tasks per task type.
#[derive(Debug, Clone, Default)]
pub struct SyntheticTaskGenerator;

impl SyntheticTaskGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Task number `sequence` of `task_type`. The same inputs always yield
    /// the same task.
    pub fn generate(&self, task_type: &str, sequence: usize) -> CanonicalTask {
        let base = CanonicalTask::new(task_type, "synthetic-user", "@synthetic")
            .with_source(SYNTHETIC_SOURCE)
            .with_context("synthetic", true)
            .with_context("sequence", sequence as u64);

        match task_type.to_ascii_uppercase().as_str() {
            GOAL_PLANNING => {
                const MESSAGES: &[&str] = &[
                    "I want to run a half marathon by the spring",
                    "Let's plan the product launch for next quarter",
                    "Can we organize a team offsite in June?",
                ];
                base.with_raw_message(pick(MESSAGES, sequence))
                    .with_intent("plan_goal")
            }
            "EVENT_CREATION" => {
                const EVENTS: &[(&str, &str, &str)] = &[
                    ("Design review", "thursday", "15:00"),
                    ("Dentist appointment", "monday", "09:30"),
                    ("Team lunch", "friday", "12:30"),
                ];
                let (title, day, time) = pick(EVENTS, sequence);
                base.with_raw_message(format!("Schedule {} on {} at {}", title, day, time))
                    .with_intent("create_event")
                    .with_entity("title", title)
                    .with_entity("date", day)
                    .with_entity("time", time)
            }
            "INVOICE_EXTRACTION" => {
                const INVOICES: &[(&str, &str, f64)] = &[
                    ("INV-1042", "Acme Supplies", 1280.50),
                    ("INV-2210", "Northwind Traders", 342.00),
                    ("INV-0007", "Globex", 98.99),
                ];
                let (number, vendor, total) = pick(INVOICES, sequence);
                base.with_raw_message(format!(
                    "Extract the line items from invoice {} issued by {}",
                    number, vendor
                ))
                .with_intent("extract_invoice")
                .with_entity("invoice_number", number)
                .with_entity("vendor", vendor)
                .with_entity("expected_total", total)
            }
            "RECIPE_GENERATION" => {
                const RECIPES: &[(&[&str], &str)] = &[
                    (&["chickpeas", "spinach", "garlic"], "vegetarian"),
                    (&["salmon", "lemon", "dill"], "pescatarian"),
                    (&["tofu", "rice", "scallions"], "vegan"),
                ];
                let (ingredients, diet) = pick(RECIPES, sequence);
                base.with_raw_message(format!(
                    "Suggest a {} dinner using {}",
                    diet,
                    ingredients.join(", ")
                ))
                .with_intent("generate_recipe")
                .with_entity("ingredients", json!(ingredients))
                .with_entity("diet", diet)
            }
            _ => base
                .with_raw_message(format!("Synthetic {} task #{}", task_type, sequence + 1))
                .with_intent(task_type.to_ascii_lowercase()),
        }
    }
}

fn pick<T: Copy>(items: &[T], sequence: usize) -> T {
    items[sequence % items.len()]
}

/// Outcome of one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub picked: usize,
    pub completed: usize,
    pub failed: usize,
    pub tasks: Vec<SyntheticTask>,
}

/// Why a RUNNING task failed, plus whatever was observed before.
struct Failure {
    reason: String,
    usage_log_id: Option<RecordId>,
    outcome: Option<ExecutionOutcome>,
}

impl Failure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            usage_log_id: None,
            outcome: None,
        }
    }
}

struct Completion {
    usage_log_id: RecordId,
    outcome: ExecutionOutcome,
    validation: Option<ValidationEvent>,
}

/// Drives synthetic tasks through the routing pipeline.
pub struct SyntheticTaskOrchestrator {
    router: TaskRouter,
    store: Arc<CapabilityStore>,
    generator: SyntheticTaskGenerator,
    tasks: RwLock<Vec<SyntheticTask>>,
    /// Held for the whole of a batch.
    batch_lock: Mutex<()>,
    batch_size: usize,
    max_enqueue: usize,
    validation_wait: Duration,
}

impl SyntheticTaskOrchestrator {
    pub fn new(
        router: TaskRouter,
        store: Arc<CapabilityStore>,
        batch_size: usize,
        validation_wait: Duration,
    ) -> Self {
        Self {
            router,
            store,
            generator: SyntheticTaskGenerator::new(),
            tasks: RwLock::new(Vec::new()),
            batch_lock: Mutex::new(()),
            batch_size: batch_size.max(1),
            max_enqueue: DEFAULT_MAX_ENQUEUE,
            validation_wait,
        }
    }

    /// Builder method to cap the tasks one enqueue call may create.
    pub fn with_max_enqueue(mut self, max_enqueue: usize) -> Self {
        self.max_enqueue = max_enqueue.max(1);
        self
    }

    /// Create `count` PENDING tasks for an EXPERIMENTAL agent, cycling
    /// through its task types. `count` must be between 1 and the configured
    /// maximum.
    pub async fn enqueue_for_agent(
        &self,
        agent_id: &AgentId,
        count: usize,
    ) -> Result<Vec<SyntheticTask>, OrchestratorError> {
        if count == 0 || count > self.max_enqueue {
            return Err(CoreError::InvalidInput(format!(
                "count must be between 1 and {}, got {}",
                self.max_enqueue, count
            ))
            .into());
        }
        let record = self
            .store
            .get(agent_id)
            .await
            .ok_or_else(|| CoreError::AgentNotFound(agent_id.to_string()))?;
        let descriptor = &record.descriptor;
        if descriptor.status != AgentStatus::Experimental {
            return Err(OrchestratorError::NotExperimental(descriptor.slug.clone()));
        }
        let task_types = record
            .capabilities
            .effective_task_types(descriptor.domain.as_deref());
        if task_types.is_empty() {
            return Err(OrchestratorError::NoTaskTypes(descriptor.slug.clone()));
        }

        let mut tasks = self.tasks.write().await;
        let offset = tasks.iter().filter(|t| &t.agent_id == agent_id).count();
        let created: Vec<SyntheticTask> = (0..count)
            .map(|i| {
                let sequence = offset + i;
                let task_type = &task_types[sequence % task_types.len()];
                let task = self
                    .generator
                    .generate(task_type, sequence)
                    .with_urgency(Urgency::Low);
                SyntheticTask::new(agent_id.clone(), task)
            })
            .collect();
        tasks.extend(created.iter().cloned());

        info!(agent = %descriptor.slug, count, "Synthetic tasks enqueued");
        Ok(created)
    }

    /// Run up to one batch of PENDING tasks, one after another. A batch
    /// started while another is running waits for it to finish.
    pub async fn run_batch(&self) -> BatchReport {
        let _running = self.batch_lock.lock().await;
        let batch: Vec<SyntheticTask> = {
            let mut tasks = self.tasks.write().await;
            let mut picked = Vec::new();
            for task in tasks
                .iter_mut()
                .filter(|t| t.status == SyntheticTaskStatus::Pending)
                .take(self.batch_size)
            {
                match task.start() {
                    Ok(()) => picked.push(task.clone()),
                    Err(e) => warn!(task_id = %task.id, error = %e, "Could not start synthetic task"),
                }
            }
            picked
        };

        let mut report = BatchReport {
            picked: batch.len(),
            completed: 0,
            failed: 0,
            tasks: Vec::with_capacity(batch.len()),
        };

        for task in batch {
            let result = self.drive(&task).await;
            let finished = self.settle(&task.id, result).await;
            if let Some(finished) = finished {
                match finished.status {
                    SyntheticTaskStatus::Completed => report.completed += 1,
                    SyntheticTaskStatus::Failed => report.failed += 1,
                    _ => {}
                }
                report.tasks.push(finished);
            }
        }

        info!(
            picked = report.picked,
            completed = report.completed,
            failed = report.failed,
            "Synthetic batch finished"
        );
        report
    }

    async fn drive(&self, task: &SyntheticTask) -> Result<Completion, Failure> {
        let request = RouteRequest::new(task.task.clone())
            .with_mode(ExecutionMode::Evaluation)
            .pinned_to(task.agent_id.clone());
        let routed = self.router.route(request).await;
        let response = routed.response;

        let Some(outcome) = routed.outcome else {
            return Err(Failure::new(
                response
                    .error
                    .unwrap_or_else(|| "task was not routed".to_string()),
            ));
        };

        if !outcome.success {
            let reason = outcome
                .detail
                .clone()
                .or_else(|| outcome.error.clone())
                .unwrap_or_else(|| "agent execution failed".to_string());
            return Err(Failure {
                reason,
                usage_log_id: response.usage_log_id,
                outcome: Some(outcome),
            });
        }

        let located = match &response.usage_log_id {
            Some(id) => self.router.telemetry().get(id).await,
            None => None,
        };
        let Some(record) = located else {
            return Err(Failure {
                reason: "execution telemetry record not found".to_string(),
                usage_log_id: response.usage_log_id,
                outcome: Some(outcome),
            });
        };

        let is_validator = match self.store.get(&task.agent_id).await {
            Some(agent) => agent.descriptor.is_validator,
            None => false,
        };
        let validation = if is_validator {
            None
        } else {
            let awaited = match routed.validation {
                Some(ticket) => ticket
                    .wait(self.validation_wait)
                    .await
                    .map_err(|e| format!("validation not observed: {}", e)),
                None => Err("validation was not queued".to_string()),
            };
            match awaited {
                Ok(event) => Some(event),
                Err(reason) => {
                    return Err(Failure {
                        reason,
                        usage_log_id: Some(record.id),
                        outcome: Some(outcome),
                    })
                }
            }
        };

        Ok(Completion {
            usage_log_id: record.id,
            outcome,
            validation,
        })
    }

    async fn settle(
        &self,
        id: &SyntheticTaskId,
        result: Result<Completion, Failure>,
    ) -> Option<SyntheticTask> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.iter_mut().find(|t| &t.id == id)?;

        let transition = match result {
            Ok(done) => task.complete(done.usage_log_id, done.outcome, done.validation),
            Err(failure) => {
                if let Some(outcome) = failure.outcome {
                    task.record_outcome(failure.usage_log_id, outcome);
                }
                warn!(task_id = %id, reason = %failure.reason, "Synthetic task failed");
                task.fail(failure.reason)
            }
        };
        if let Err(e) = transition {
            warn!(task_id = %id, error = %e, "Synthetic task transition rejected");
        }
        Some(task.clone())
    }

    /// All synthetic tasks, oldest first.
    pub async fn list(&self) -> Vec<SyntheticTask> {
        self.tasks.read().await.clone()
    }

    pub async fn count_by_status(&self) -> HashMap<SyntheticTaskStatus, usize> {
        let mut counts = HashMap::new();
        for task in self.tasks.read().await.iter() {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        counts
    }
}
