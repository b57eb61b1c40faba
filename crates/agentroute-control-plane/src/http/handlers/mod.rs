//! HTTP request handlers.

mod agents;
mod health;
mod route;
mod synthetic;
mod telemetry;
mod validations;

pub use agents::{list_agents, ranking};
pub use health::{health_check, metrics_handler};
pub use route::route_task;
pub use synthetic::{enqueue_synthetic, list_synthetic, run_synthetic};
pub use telemetry::get_telemetry;
pub use validations::{override_validation, record_validation};
