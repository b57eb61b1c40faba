//! Declared agent input formats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One `target_path <= source.path` rule of a custom mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Dotted path written in the agent task.
    pub target: String,
    /// Dotted path read from the canonical task.
    pub source: String,
}

/// The input shape an agent declares it accepts.
///
/// Parsed once from the capability descriptor so the transformer can match
/// exhaustively instead of comparing strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFormat {
    /// Canonical shape, passed through.
    Standard,
    /// Canonical shape, passed through; the agent parses the raw text itself.
    RawMessage,
    /// Raw text plus declared preferred fields wrapped in a context object.
    NlpCreate,
    /// Extracted entities spread into the context object.
    Structured,
    /// Declarative field mapping.
    Custom { mapping: Vec<FieldMapping> },
    /// Anything else. Left untouched; the agent parses the canonical shape.
    Unknown(String),
}

impl InputFormat {
    /// Build the format from the declared name and the descriptor's mapping
    /// table. The mapping is only consulted for `custom`.
    pub fn from_declared(name: &str, mapping: &BTreeMap<String, String>) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "standard" => Self::Standard,
            "raw_message" => Self::RawMessage,
            "nlp_create" => Self::NlpCreate,
            "structured" => Self::Structured,
            "custom" => Self::Custom {
                mapping: mapping
                    .iter()
                    .map(|(target, source)| FieldMapping {
                        target: target.clone(),
                        source: source.clone(),
                    })
                    .collect(),
            },
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Declared name of the format.
    pub fn name(&self) -> &str {
        match self {
            Self::Standard => "standard",
            Self::RawMessage => "raw_message",
            Self::NlpCreate => "nlp_create",
            Self::Structured => "structured",
            Self::Custom { .. } => "custom",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_formats() {
        let empty = BTreeMap::new();
        assert_eq!(InputFormat::from_declared("standard", &empty), InputFormat::Standard);
        assert_eq!(InputFormat::from_declared("", &empty), InputFormat::Standard);
        assert_eq!(InputFormat::from_declared("NLP_CREATE", &empty), InputFormat::NlpCreate);
        assert_eq!(
            InputFormat::from_declared("xml-ish", &empty),
            InputFormat::Unknown("xml-ish".into())
        );
    }

    #[test]
    fn test_custom_carries_mapping_in_target_order() {
        let mut mapping = BTreeMap::new();
        mapping.insert("title".to_string(), "extracted_entities.title".to_string());
        mapping.insert("body".to_string(), "raw_message".to_string());

        let InputFormat::Custom { mapping } = InputFormat::from_declared("custom", &mapping) else {
            panic!("expected custom format");
        };
        assert_eq!(mapping[0].target, "body");
        assert_eq!(mapping[1].source, "extracted_entities.title");
    }
}
