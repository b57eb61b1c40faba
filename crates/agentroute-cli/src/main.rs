//! agentroute CLI - command line interface for the agentroute control plane.

mod client;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use agentroute_core::{CanonicalTask, ValidationLabel};

use client::HttpClient;

/// agentroute CLI - control plane management tool
#[derive(Parser)]
#[command(name = "agentroute")]
#[command(about = "CLI for the agentroute control plane", long_about = None)]
struct Cli {
    /// Control plane address
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a canonical task
    Route {
        /// Task type, e.g. EVENT_CREATION
        #[arg(long = "type")]
        task_type: String,

        /// Requester id
        #[arg(long)]
        user: String,

        /// Requester handle
        #[arg(long)]
        handle: String,

        /// Raw message text
        #[arg(long)]
        message: Option<String>,

        /// Target domain for the domain bonus
        #[arg(long)]
        domain: Option<String>,

        /// Route to EXPERIMENTAL agents instead of ACTIVE ones
        #[arg(long)]
        evaluation: bool,
    },

    /// List agents with their current snapshots
    Agents,

    /// Create synthetic tasks for an EXPERIMENTAL agent
    #[command(name = "enqueue-synthetic")]
    EnqueueSynthetic {
        /// Agent ID
        #[arg(long)]
        agent: String,

        /// Number of tasks
        #[arg(long, default_value = "1")]
        count: usize,
    },

    /// Run one batch of synthetic tasks
    #[command(name = "run-synthetic")]
    RunSynthetic,

    /// Override the validation of an execution record
    Override {
        /// Execution telemetry record id
        #[arg(long)]
        record: String,

        /// Score in [0, 1]
        #[arg(long)]
        score: f64,

        /// PASS, FAIL or NEEDS_REVIEW
        #[arg(long, value_parser = parse_label)]
        label: ValidationLabel,

        /// Free-text explanation
        #[arg(long, default_value = "")]
        explanation: String,
    },
}

fn parse_label(raw: &str) -> Result<ValidationLabel, String> {
    serde_json::from_value(Value::String(raw.to_ascii_uppercase()))
        .map_err(|_| format!("unknown label '{}' (expected PASS, FAIL or NEEDS_REVIEW)", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = HttpClient::new(&cli.addr);

    let output: Value = match cli.command {
        Commands::Route {
            task_type,
            user,
            handle,
            message,
            domain,
            evaluation,
        } => {
            let mut task = CanonicalTask::new(task_type, user, handle).with_source("cli");
            if let Some(message) = message {
                task = task.with_raw_message(message);
            }
            let mode = if evaluation { "evaluation" } else { "production" };
            let body = json!({ "task": task, "mode": mode, "domain": domain });
            client.post_json("/v1/route", &body).await?
        }
        Commands::Agents => client.get_json("/v1/agents").await?,
        Commands::EnqueueSynthetic { agent, count } => {
            let body = json!({ "agent_id": agent, "count": count });
            client.post_json("/v1/synthetic/tasks", &body).await?
        }
        Commands::RunSynthetic => client.post_json("/v1/synthetic/run", &json!({})).await?,
        Commands::Override {
            record,
            score,
            label,
            explanation,
        } => {
            let body = json!({ "score": score, "label": label, "explanation": explanation });
            client
                .post_json(&format!("/v1/validations/{}/override", record), &body)
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("pass"), Ok(ValidationLabel::Pass));
        assert_eq!(parse_label("NEEDS_REVIEW"), Ok(ValidationLabel::NeedsReview));
        assert!(parse_label("maybe").is_err());
    }

    #[test]
    fn test_cli_parses_route() {
        let cli = Cli::try_parse_from([
            "agentroute",
            "route",
            "--type",
            "GOAL_PLANNING",
            "--user",
            "u1",
            "--handle",
            "@u1",
            "--evaluation",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Route { evaluation: true, ref task_type, .. } if task_type == "GOAL_PLANNING"
        ));
    }
}
