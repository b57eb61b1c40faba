//! Agent descriptors, declared capabilities and learned snapshots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::{AgentId, AgentStatus, InputFormat, Trend};

/// Success rate assumed for an agent with no validations yet.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.5;

/// How an agent is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationMode {
    /// A named in-process execution target.
    Internal,
    /// A remote HTTP endpoint.
    ExternalHttp,
    /// Any mode this build does not understand.
    #[serde(other)]
    Unrecognized,
}

/// Where and how to invoke an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationDescriptor {
    pub mode: InvocationMode,

    /// Internal target name, or URL for `EXTERNAL_HTTP`.
    #[serde(default)]
    pub target: Option<String>,

    /// HTTP method; `POST` when absent.
    #[serde(default)]
    pub method: Option<String>,

    /// Extra HTTP headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl InvocationDescriptor {
    /// In-process invocation of a named target.
    pub fn internal(target: impl Into<String>) -> Self {
        Self {
            mode: InvocationMode::Internal,
            target: Some(target.into()),
            method: None,
            headers: HashMap::new(),
        }
    }

    /// Remote invocation via HTTP POST.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            mode: InvocationMode::ExternalHttp,
            target: Some(url.into()),
            method: None,
            headers: HashMap::new(),
        }
    }
}

/// A registered specialist agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: AgentId,

    /// Unique, human-readable slug.
    pub slug: String,

    /// Domain tag; also the implicit task type when none are declared.
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub status: AgentStatus,

    pub invocation: InvocationDescriptor,

    /// Validator agents score other agents' output and are never validated
    /// themselves.
    #[serde(default)]
    pub is_validator: bool,
}

impl AgentDescriptor {
    /// Create a new AgentDescriptor.
    pub fn new(
        id: impl Into<AgentId>,
        slug: impl Into<String>,
        status: AgentStatus,
        invocation: InvocationDescriptor,
    ) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            domain: None,
            status,
            invocation,
            is_validator: false,
        }
    }

    /// Builder method to set the domain tag.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Builder method to mark the agent as a validator.
    pub fn as_validator(mut self) -> Self {
        self.is_validator = true;
        self
    }

    /// Whether the agent's domain equals `domain` (case-insensitive).
    pub fn in_domain(&self, domain: &str) -> bool {
        self.domain
            .as_deref()
            .map(|d| d.eq_ignore_ascii_case(domain))
            .unwrap_or(false)
    }
}

/// The `input_transformation` block of a capability descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTransformation {
    /// `target_path -> dotted.source.path`.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

/// The contract an agent declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    #[serde(default)]
    pub supported_task_types: Vec<String>,

    #[serde(default)]
    pub input_format: String,

    /// Defaults merged into `nlp_create` payloads, e.g. `auto_invite`.
    #[serde(default)]
    pub preferred_fields: Map<String, Value>,

    #[serde(default)]
    pub input_transformation: InputTransformation,

    #[serde(default)]
    pub constraints: Map<String, Value>,

    /// Minimum requester `trust_level` (read from the task context).
    #[serde(default)]
    pub required_trust_threshold: Option<f64>,
}

impl CapabilityDescriptor {
    /// Declared input format, parsed.
    pub fn input_format(&self) -> InputFormat {
        InputFormat::from_declared(&self.input_format, &self.input_transformation.mapping)
    }

    /// Task types this agent handles. Falls back to the domain tag when none
    /// are declared.
    pub fn effective_task_types(&self, domain: Option<&str>) -> Vec<String> {
        if !self.supported_task_types.is_empty() {
            return self.supported_task_types.clone();
        }
        domain.map(|d| vec![d.to_string()]).unwrap_or_default()
    }

    /// Whether this agent handles `task_type`.
    pub fn supports(&self, task_type: &str, domain: Option<&str>) -> bool {
        self.effective_task_types(domain)
            .iter()
            .any(|t| t.eq_ignore_ascii_case(task_type))
    }
}

/// Declared contract plus learned statistics for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub agent_id: AgentId,
    pub supported_task_types: Vec<String>,
    pub input_format: String,
    pub recent_success_rate: f64,
    pub success_rate: f64,
    pub average_validator_score: Option<f64>,
    pub validation_count: u64,
    pub average_latency_ms: Option<f64>,
    pub trend: Option<Trend>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_invocation_mode_deserializes() {
        let desc: InvocationDescriptor =
            serde_json::from_value(json!({"mode": "CARRIER_PIGEON"})).unwrap();
        assert_eq!(desc.mode, InvocationMode::Unrecognized);
        assert!(desc.target.is_none());
    }

    #[test]
    fn test_domain_fallback_for_task_types() {
        let caps = CapabilityDescriptor::default();
        assert!(caps.supports("recipes", Some("RECIPES")));
        assert!(!caps.supports("recipes", None));

        let declared = CapabilityDescriptor {
            supported_task_types: vec!["EVENT_CREATION".into()],
            ..Default::default()
        };
        assert!(declared.supports("event_creation", Some("recipes")));
        assert!(!declared.supports("recipes", Some("recipes")));
    }

    #[test]
    fn test_capability_descriptor_wire_shape() {
        let caps: CapabilityDescriptor = serde_json::from_value(json!({
            "supported_task_types": ["EVENT_CREATION"],
            "input_format": "nlp_create",
            "preferred_fields": {"auto_invite": true},
            "input_transformation": {"mapping": {}},
            "constraints": {"max_attendees": 20},
            "required_trust_threshold": 0.3
        }))
        .unwrap();
        assert_eq!(caps.input_format(), InputFormat::NlpCreate);
        assert_eq!(caps.preferred_fields.get("auto_invite"), Some(&json!(true)));
        assert_eq!(caps.required_trust_threshold, Some(0.3));
    }
}
