//! Format transformer - adapts a canonical task to an agent's declared input
//! shape.
//!
//! Every run yields a [`TransformationTrace`] that is attached to the
//! execution telemetry record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use agentroute_core::{
    AgentTask, CanonicalTask, CapabilityDescriptor, FieldMapping, InputFormat, RouteError,
};

/// Goal used when nothing in the task describes one.
pub const FALLBACK_GOAL: &str = "Plan next steps";

/// Conversational openers stripped before a goal is read from raw text.
/// Longer phrases come first so they win over their prefixes.
const LEADING_PHRASES: &[&str] = &[
    "can you help me",
    "i would like to",
    "i'd like to",
    "i want to",
    "i need to",
    "could we",
    "can we",
    "help me",
    "let's",
    "let us",
    "lets",
];

const CLAUSE_TERMINATORS: &[char] = &['.', '!', '?', ';', ',', '\n'];

/// How one target field was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOutcome {
    /// Copied from a resolved source path.
    Mapped,
    /// Source path did not resolve; field left out.
    Unmapped,
    /// Filled from the agent's preferred fields.
    Defaulted,
    /// Spread from extracted entities.
    Spread,
    /// Computed, e.g. the goal of a planning task.
    Derived,
}

/// Per-field record of a transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTrace {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub outcome: FieldOutcome,
}

/// What a transformation did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationTrace {
    /// Declared format name.
    pub format: String,
    /// Whether the payload differs from the canonical shape.
    pub applied: bool,
    /// Set when the task was already agent-shaped and left alone.
    pub short_circuited: bool,
    pub fields: Vec<FieldTrace>,
}

impl TransformationTrace {
    fn new(format: &InputFormat) -> Self {
        Self {
            format: format.name().to_string(),
            applied: false,
            short_circuited: false,
            fields: Vec::new(),
        }
    }

    fn push(&mut self, target: impl Into<String>, source: Option<String>, outcome: FieldOutcome) {
        self.fields.push(FieldTrace {
            target: target.into(),
            source,
            outcome,
        });
    }

    /// Targets whose source did not resolve.
    pub fn unmapped(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.outcome == FieldOutcome::Unmapped)
            .map(|f| f.target.clone())
            .collect()
    }

    /// The non-fatal gap to record, if any field went unmapped.
    pub fn gap(&self) -> Option<RouteError> {
        let fields = self.unmapped();
        (!fields.is_empty()).then_some(RouteError::TransformationGap { fields })
    }
}

/// A transformed task and its trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub task: AgentTask,
    pub trace: TransformationTrace,
}

/// Transform `task` for an agent declaring `capabilities`.
pub fn transform(task: &CanonicalTask, capabilities: &CapabilityDescriptor) -> Transformed {
    transform_with(task, &capabilities.input_format(), &capabilities.preferred_fields)
}

/// Transform `task` into `format`, using `preferred_fields` as defaults for
/// `nlp_create`.
pub fn transform_with(
    task: &CanonicalTask,
    format: &InputFormat,
    preferred_fields: &Map<String, Value>,
) -> Transformed {
    let canonical = canonical_value(task);
    let mut trace = TransformationTrace::new(format);

    if task.looks_agent_shaped() {
        trace.short_circuited = true;
        let mut payload = canonical.clone();
        if task.is_goal_planning() {
            ensure_goal(&mut payload, task, &mut trace);
        }
        return finish(payload, &canonical, trace);
    }

    let mut payload = match format {
        InputFormat::Standard | InputFormat::RawMessage => canonical.clone(),
        InputFormat::NlpCreate => nlp_create(task, preferred_fields, &mut trace),
        InputFormat::Structured => structured(task, &mut trace),
        InputFormat::Custom { mapping } => custom(&canonical, mapping, &mut trace),
        InputFormat::Unknown(name) => {
            debug!(format = %name, "Unknown input format, passing canonical task through");
            return finish(canonical.clone(), &canonical, trace);
        }
    };

    if task.is_goal_planning() {
        ensure_goal(&mut payload, task, &mut trace);
    }

    let transformed = finish(payload, &canonical, trace);
    if let Some(gap) = transformed.trace.gap() {
        warn!(format = %format, error = %gap, "Transformation left fields unmapped");
    }
    transformed
}

fn finish(payload: Value, canonical: &Value, mut trace: TransformationTrace) -> Transformed {
    trace.applied = &payload != canonical;
    Transformed {
        task: AgentTask::new(payload),
        trace,
    }
}

fn canonical_value(task: &CanonicalTask) -> Value {
    serde_json::to_value(task).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn identity_fields(task: &CanonicalTask) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("type".into(), Value::String(task.task_type.clone()));
    out.insert("user_id".into(), Value::String(task.user_id.clone()));
    out.insert("handle".into(), Value::String(task.handle.clone()));
    out.insert("source".into(), Value::String(task.source.clone()));
    out.insert(
        "requires_confirmation".into(),
        Value::Bool(task.requires_confirmation),
    );
    out
}

fn nlp_create(
    task: &CanonicalTask,
    preferred_fields: &Map<String, Value>,
    trace: &mut TransformationTrace,
) -> Value {
    let raw = task.raw_message.clone().unwrap_or_default();

    let mut context = task.context.clone().unwrap_or_default();
    for (key, value) in preferred_fields {
        // Task context wins over the agent's defaults.
        if context.contains_key(key) {
            continue;
        }
        context.insert(key.clone(), value.clone());
        trace.push(format!("context.{key}"), None, FieldOutcome::Defaulted);
    }
    context.insert("raw_message".into(), Value::String(raw.clone()));

    let mut out = identity_fields(task);
    out.insert("action".into(), Value::String("create".into()));
    out.insert("message".into(), Value::String(raw));
    out.insert("context".into(), Value::Object(context));
    Value::Object(out)
}

fn structured(task: &CanonicalTask, trace: &mut TransformationTrace) -> Value {
    let mut context = task.context.clone().unwrap_or_default();
    if let Some(entities) = &task.extracted_entities {
        for (key, value) in entities {
            context.insert(key.clone(), value.clone());
            trace.push(
                format!("context.{key}"),
                Some(format!("extracted_entities.{key}")),
                FieldOutcome::Spread,
            );
        }
    }

    let mut out = identity_fields(task);
    if let Some(intent) = &task.intent {
        out.insert("intent".into(), Value::String(intent.clone()));
    }
    if let Some(raw) = &task.raw_message {
        out.insert("raw_message".into(), Value::String(raw.clone()));
    }
    out.insert("context".into(), Value::Object(context));
    Value::Object(out)
}

fn custom(canonical: &Value, mapping: &[FieldMapping], trace: &mut TransformationTrace) -> Value {
    let mut out = Value::Object(Map::new());
    for rule in mapping {
        match lookup_path(canonical, &rule.source).filter(|v| !v.is_null()) {
            Some(value) => {
                set_path(&mut out, &rule.target, value.clone());
                trace.push(&rule.target, Some(rule.source.clone()), FieldOutcome::Mapped);
            }
            None => {
                trace.push(&rule.target, Some(rule.source.clone()), FieldOutcome::Unmapped);
            }
        }
    }
    out
}

/// Resolve a dotted path such as `extracted_entities.title`.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| current.get(segment))
}

/// Write `value` at a dotted path, creating intermediate objects. Non-object
/// intermediates are replaced.
pub fn set_path(target: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = target;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}

/// Guarantee a non-empty `context.goal` on a planning payload. An existing
/// goal is kept, which makes repeated transformation a no-op.
fn ensure_goal(payload: &mut Value, task: &CanonicalTask, trace: &mut TransformationTrace) {
    let existing = lookup_path(payload, "context.goal")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|g| !g.is_empty());
    if existing.is_some() {
        return;
    }

    let (goal, source) = derive_goal(task);
    set_path(payload, "context.goal", Value::String(goal));
    trace.push("context.goal", Some(source.to_string()), FieldOutcome::Derived);
}

/// Derive a planning goal. Never fails and never returns an empty string.
pub fn derive_goal(task: &CanonicalTask) -> (String, &'static str) {
    if let Some(goal) = task.context_str("goal") {
        return (goal.to_string(), "context.goal");
    }
    if let Some(goal) = task.entity_str("goal") {
        return (goal.to_string(), "extracted_entities.goal");
    }
    if let Some(goal) = task.raw_message.as_deref().and_then(goal_from_text) {
        return (goal, "raw_message");
    }
    if let Some(goal) = task.description().and_then(goal_from_text) {
        return (goal, "description");
    }
    (FALLBACK_GOAL.to_string(), "fallback")
}

/// Strip a conversational opener and keep the first clause.
pub fn goal_from_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    // ASCII lowering keeps byte offsets aligned with `trimmed`.
    let lowered = trimmed.to_ascii_lowercase();

    let mut rest = trimmed;
    for phrase in LEADING_PHRASES {
        if lowered.starts_with(phrase) {
            let boundary_ok = lowered[phrase.len()..]
                .chars()
                .next()
                .map(|c| !c.is_alphanumeric())
                .unwrap_or(true);
            if boundary_ok {
                rest = &trimmed[phrase.len()..];
                break;
            }
        }
    }

    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == ':');
    let clause = rest
        .split(CLAUSE_TERMINATORS)
        .next()
        .unwrap_or_default()
        .trim();

    (!clause.is_empty()).then(|| clause.to_string())
}
