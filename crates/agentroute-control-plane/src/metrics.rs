//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use agentroute_core::{AgentStatus, SyntheticTaskStatus};

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_agent_metrics(state, &mut output).await;
    collect_synthetic_metrics(state, &mut output).await;
    collect_pipeline_metrics(state, &mut output).await;

    output
}

/// Collect agent metrics by status.
async fn collect_agent_metrics(state: &Arc<AppState>, output: &mut String) {
    let counts = state.store.count_by_status().await;
    let count = |status: AgentStatus| counts.get(&status).copied().unwrap_or(0);

    writeln!(
        output,
        "# HELP agentroute_agents Number of registered agents by status"
    )
    .ok();
    writeln!(output, "# TYPE agentroute_agents gauge").ok();
    for (label, status) in [
        ("active", AgentStatus::Active),
        ("experimental", AgentStatus::Experimental),
        ("disabled", AgentStatus::Disabled),
    ] {
        writeln!(
            output,
            "agentroute_agents{{status=\"{label}\"}} {}",
            count(status)
        )
        .ok();
    }
}

/// Collect synthetic task metrics by status.
async fn collect_synthetic_metrics(state: &Arc<AppState>, output: &mut String) {
    let counts = state.orchestrator.count_by_status().await;
    let count = |status: SyntheticTaskStatus| counts.get(&status).copied().unwrap_or(0);

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentroute_synthetic_tasks Synthetic tasks by status"
    )
    .ok();
    writeln!(output, "# TYPE agentroute_synthetic_tasks gauge").ok();
    for (label, status) in [
        ("pending", SyntheticTaskStatus::Pending),
        ("running", SyntheticTaskStatus::Running),
        ("completed", SyntheticTaskStatus::Completed),
        ("failed", SyntheticTaskStatus::Failed),
    ] {
        writeln!(
            output,
            "agentroute_synthetic_tasks{{status=\"{label}\"}} {}",
            count(status)
        )
        .ok();
    }
}

/// Collect outbox, telemetry and ledger sizes.
async fn collect_pipeline_metrics(state: &Arc<AppState>, output: &mut String) {
    let pending = state.router.outbox().pending_count();
    let records = state.router.telemetry().count().await;
    let events = state.ledger.len().await;

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentroute_validations_pending Validation jobs queued or in flight"
    )
    .ok();
    writeln!(output, "# TYPE agentroute_validations_pending gauge").ok();
    writeln!(output, "agentroute_validations_pending {pending}").ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentroute_telemetry_records Telemetry records written"
    )
    .ok();
    writeln!(output, "# TYPE agentroute_telemetry_records gauge").ok();
    writeln!(output, "agentroute_telemetry_records {records}").ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP agentroute_validation_events Validation events in the ledger"
    )
    .ok();
    writeln!(output, "# TYPE agentroute_validation_events gauge").ok();
    writeln!(output, "agentroute_validation_events {events}").ok();
}
