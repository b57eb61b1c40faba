//! agentroute Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Storage
//! - Runtime specifics
//!
//! Everything the control plane routes, scores, transforms and records is
//! described here.

pub mod agent;
pub mod error;
pub mod format;
pub mod ids;
pub mod outcome;
pub mod routing;
pub mod status;
pub mod synthetic;
pub mod task;
pub mod validation;

// Re-export commonly used types
pub use agent::{
    AgentDescriptor, CapabilityDescriptor, CapabilitySnapshot, InvocationDescriptor,
    InvocationMode, DEFAULT_SUCCESS_RATE,
};
pub use error::{CoreError, RouteError, RouteErrorKind};
pub use format::{FieldMapping, InputFormat};
pub use ids::{AgentId, RecordId, SyntheticTaskId};
pub use outcome::ExecutionOutcome;
pub use routing::{RankedCandidate, RoutingDecision, ScoreBreakdown};
pub use status::{AgentStatus, ExecutionMode, SyntheticTaskStatus, Trend};
pub use synthetic::SyntheticTask;
pub use task::{AgentTask, CanonicalTask, Urgency, GOAL_PLANNING};
pub use validation::{ValidationErrorType, ValidationEvent, ValidationLabel};
