//! Agent list and ranking handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::http::responses::{AgentResponse, RankingQuery};
use crate::state::AppState;

/// List agents with their current snapshots.
pub async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut response = Vec::new();
    for record in state.store.list().await {
        let snapshot = state.store.snapshot_of(&record).await;
        response.push(AgentResponse {
            descriptor: record.descriptor,
            capabilities: record.capabilities,
            snapshot,
        });
    }
    Json(response)
}

/// Score candidates for a task type without dispatching.
pub async fn ranking(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankingQuery>,
) -> impl IntoResponse {
    let decision = state
        .router
        .decide(&query.task_type, query.mode, query.domain.as_deref())
        .await;
    Json(decision)
}
