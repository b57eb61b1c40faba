//! Canonical and agent-shaped task payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task type whose payload always carries a derived `context.goal`.
pub const GOAL_PLANNING: &str = "GOAL_PLANNING";

/// How soon the requester needs an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

/// A normalized request, independent of any agent's expected input shape.
///
/// Never mutated after creation; transformation always produces a separate
/// [`AgentTask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTask {
    /// Task type, e.g. `GOAL_PLANNING` or `EVENT_CREATION`.
    #[serde(rename = "type")]
    pub task_type: String,

    /// Requesting user.
    pub user_id: String,

    /// Requester handle.
    pub handle: String,

    /// Free text as the user wrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<String>,

    /// Upstream intent classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    /// Entities extracted upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_entities: Option<Map<String, Value>>,

    /// Arbitrary request context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,

    /// Originating surface.
    #[serde(default = "default_source")]
    pub source: String,

    /// Whether the requester must confirm before side effects happen.
    #[serde(default)]
    pub requires_confirmation: bool,

    #[serde(default)]
    pub urgency: Urgency,
}

fn default_source() -> String {
    "api".to_string()
}

impl CanonicalTask {
    /// Create a new CanonicalTask with minimal required fields.
    pub fn new(
        task_type: impl Into<String>,
        user_id: impl Into<String>,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            task_type: task_type.into(),
            user_id: user_id.into(),
            handle: handle.into(),
            raw_message: None,
            intent: None,
            extracted_entities: None,
            context: None,
            source: default_source(),
            requires_confirmation: false,
            urgency: Urgency::Normal,
        }
    }

    /// Builder method to set the raw message.
    pub fn with_raw_message(mut self, message: impl Into<String>) -> Self {
        self.raw_message = Some(message.into());
        self
    }

    /// Builder method to set the intent.
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Builder method to add an extracted entity.
    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extracted_entities
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Builder method to add a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Builder method to set the source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Whether this is a goal-planning task.
    pub fn is_goal_planning(&self) -> bool {
        self.task_type.eq_ignore_ascii_case(GOAL_PLANNING)
    }

    /// Non-empty string entry of the context map.
    pub fn context_str(&self, key: &str) -> Option<&str> {
        non_empty_str(self.context.as_ref()?.get(key))
    }

    /// Non-empty string entry of the extracted entities.
    pub fn entity_str(&self, key: &str) -> Option<&str> {
        non_empty_str(self.extracted_entities.as_ref()?.get(key))
    }

    /// The free-text description of the task, if any was supplied.
    pub fn description(&self) -> Option<&str> {
        self.context_str("description")
            .or_else(|| self.entity_str("description"))
    }

    /// Whether the request already carries an agent-shaped payload: an
    /// explicit action plus a message or details, and no raw text.
    pub fn looks_agent_shaped(&self) -> bool {
        self.raw_message.is_none()
            && self.context_str("action").is_some()
            && self
                .context
                .as_ref()
                .map(|c| c.contains_key("message") || c.contains_key("details"))
                .unwrap_or(false)
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The agent-shaped payload derived from a [`CanonicalTask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentTask {
    pub payload: Value,
}

impl AgentTask {
    /// Wrap an already agent-shaped payload.
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Look up a dotted path inside the payload, e.g. `context.goal`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.payload, |value, segment| value.get(segment))
    }
}
