//! HTTP server for the control plane.
//!
//! Provides endpoints for:
//! - Task routing (`/v1/route`)
//! - Agents and rankings (`/v1/agents`, `/v1/ranking`)
//! - Validation callbacks and overrides (`/v1/validations`)
//! - Telemetry lookup (`/v1/telemetry/:id`)
//! - Synthetic evaluation (`/v1/synthetic/*`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Routing
        .route("/v1/route", post(handlers::route_task))
        .route("/v1/agents", get(handlers::list_agents))
        .route("/v1/ranking", get(handlers::ranking))
        // Learning loop
        .route("/v1/validations", post(handlers::record_validation))
        .route(
            "/v1/validations/:usage_log_id/override",
            post(handlers::override_validation),
        )
        .route("/v1/telemetry/:id", get(handlers::get_telemetry))
        // Synthetic evaluation
        .route(
            "/v1/synthetic/tasks",
            get(handlers::list_synthetic).post(handlers::enqueue_synthetic),
        )
        .route("/v1/synthetic/run", post(handlers::run_synthetic))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{json, Value};

    use agentroute_core::{
        AgentDescriptor, AgentStatus, CapabilityDescriptor, InvocationDescriptor,
    };

    use crate::config::Config;
    use crate::dispatcher::{EchoAgent, InternalAgentRegistry};

    async fn spawn_app() -> (String, Arc<AppState>) {
        let registry = InternalAgentRegistry::new().with_agent("echo", Arc::new(EchoAgent));
        let (state, _worker) = AppState::new(&Config::default(), registry);
        let capabilities = CapabilityDescriptor {
            supported_task_types: vec!["EVENT_CREATION".into()],
            ..Default::default()
        };
        state
            .store
            .register(
                AgentDescriptor::new("a1", "echo", AgentStatus::Active, InvocationDescriptor::internal("echo")),
                capabilities.clone(),
            )
            .await;
        state
            .store
            .register(
                AgentDescriptor::new("a2", "trial", AgentStatus::Experimental, InvocationDescriptor::internal("echo")),
                capabilities,
            )
            .await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    fn route_body() -> Value {
        json!({
            "task": {
                "type": "EVENT_CREATION",
                "user_id": "u1",
                "handle": "@u1",
                "raw_message": "lunch on friday"
            }
        })
    }

    #[tokio::test]
    async fn test_route_then_override() {
        let (base, state) = spawn_app().await;
        let client = reqwest::Client::new();

        let routed: Value = client
            .post(format!("{base}/v1/route"))
            .json(&route_body())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(routed["success"], json!(true));
        assert_eq!(routed["selected_agent"], json!("echo"));
        let usage_log_id = routed["usage_log_id"].as_str().unwrap().to_string();

        let record: Value = client
            .get(format!("{base}/v1/telemetry/{usage_log_id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(record["kind"], json!("execution"));

        let machine = json!({"usage_log_id": usage_log_id, "score": 0.9, "label": "PASS"});
        for expected in ["appended", "duplicate"] {
            let accepted: Value = client
                .post(format!("{base}/v1/validations"))
                .json(&machine)
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(accepted["status"], json!(expected));
        }

        let overridden: Value = client
            .post(format!("{base}/v1/validations/{usage_log_id}/override"))
            .json(&json!({"score": 0.1, "label": "FAIL", "explanation": "wrong day"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(overridden["authoritative"]["label"], json!("FAIL"));
        assert_eq!(overridden["authoritative"]["is_human"], json!(true));

        let snapshot = state
            .store
            .snapshot(&agentroute_core::AgentId::new("a1"))
            .await
            .unwrap();
        assert_eq!(snapshot.validation_count, 1);
        assert_eq!(snapshot.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_records_are_not_found() {
        let (base, _state) = spawn_app().await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{base}/v1/telemetry/missing"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let response = client
            .post(format!("{base}/v1/validations"))
            .json(&json!({"usage_log_id": "missing", "score": 1.0, "label": "PASS"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ranking_and_agents() {
        let (base, _state) = spawn_app().await;
        let client = reqwest::Client::new();

        let decision: Value = client
            .get(format!("{base}/v1/ranking?task_type=EVENT_CREATION&mode=evaluation"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(decision["selected"], json!("a2"));

        let agents: Value = client
            .get(format!("{base}/v1/agents"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(agents.as_array().unwrap().len(), 2);
        assert_eq!(agents[0]["slug"], json!("echo"));
        assert_eq!(agents[0]["snapshot"]["validation_count"], json!(0));
    }

    #[tokio::test]
    async fn test_synthetic_enqueue_conflicts_on_active_agent() {
        let (base, _state) = spawn_app().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/v1/synthetic/tasks"))
            .json(&json!({"agent_id": "a1", "count": 2}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);

        let response = client
            .post(format!("{base}/v1/synthetic/tasks"))
            .json(&json!({"agent_id": "a2", "count": 2}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let tasks: Value = client
            .get(format!("{base}/v1/synthetic/tasks"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tasks.as_array().unwrap().len(), 2);
        assert_eq!(tasks[0]["status"], json!("PENDING"));
    }

    #[tokio::test]
    async fn test_synthetic_enqueue_rejects_oversized_count() {
        let (base, _state) = spawn_app().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/v1/synthetic/tasks"))
            .json(&json!({"agent_id": "a2", "count": u64::MAX}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("count must be between 1 and"));

        let tasks: Value = client
            .get(format!("{base}/v1/synthetic/tasks"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(tasks.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let (base, _state) = spawn_app().await;
        let health: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], json!("ok"));

        let metrics = reqwest::get(format!("{base}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(metrics.contains("agentroute_agents{status=\"experimental\"} 1"));
    }
}
