//! agentroute Control Plane Library
//!
//! Adaptive routing of canonical tasks to specialist agents: candidate
//! resolution, ranking, payload transformation, dispatch, telemetry and the
//! validation feedback loop, plus synthetic evaluation of new agents.

pub mod capability;
pub mod config;
pub mod dispatcher;
pub mod http;
pub mod learning;
pub mod metrics;
pub mod orchestrator;
pub mod ranking;
pub mod resolver;
pub mod router;
pub mod state;
pub mod telemetry;
pub mod transform;
pub mod validation;

pub use capability::{CapabilityStore, CatalogEntry, CatalogError};
pub use config::Config;
pub use dispatcher::{Dispatcher, EchoAgent, InternalAgent, InternalAgentRegistry};
pub use learning::ValidationLedger;
pub use orchestrator::{SyntheticTaskGenerator, SyntheticTaskOrchestrator};
pub use ranking::RankingWeights;
pub use router::{RouteRequest, RouteResponse, TaskRouter};
pub use state::AppState;
pub use telemetry::{TelemetryRecorder, TelemetrySink};
pub use validation::{ValidationClient, ValidationOutbox};
