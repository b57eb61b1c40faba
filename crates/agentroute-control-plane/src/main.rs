//! agentroute Control Plane Server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentroute_control_plane::{http, AppState, Config, EchoAgent, InternalAgentRegistry};

/// agentroute control plane server.
#[derive(Parser, Debug)]
#[command(name = "agentroute-control-plane", about = "Adaptive task router for specialist agents")]
struct Args {
    /// HTTP server address
    #[arg(long, default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// JSON agent catalog to load at start-up
    #[arg(long)]
    agents: Option<String>,

    /// Validation collaborator URL (validation is disabled without it)
    #[arg(long)]
    validator_url: Option<String>,

    /// Timeout for one agent call, in milliseconds
    #[arg(long, default_value = "30000")]
    agent_timeout_ms: u64,

    /// Timeout for one validator call, in milliseconds
    #[arg(long, default_value = "30000")]
    validator_timeout_ms: u64,

    /// Attempts per validation job
    #[arg(long, default_value = "3")]
    validation_attempts: u32,

    /// Backoff before the second validation attempt, in milliseconds
    #[arg(long, default_value = "500")]
    validation_backoff_ms: u64,

    /// Synthetic tasks picked up per batch
    #[arg(long, default_value = "10")]
    synthetic_batch_size: usize,

    /// Most synthetic tasks one enqueue request may create
    #[arg(long, default_value = "100")]
    synthetic_max_enqueue: usize,

    /// How long a synthetic task waits for its validation, in seconds
    #[arg(long, default_value = "60")]
    synthetic_validation_wait_secs: u64,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            http_bind_addr: self.http_addr,
            agents_path: self.agents,
            validator_url: self.validator_url,
            agent_timeout: Duration::from_millis(self.agent_timeout_ms),
            validator_timeout: Duration::from_millis(self.validator_timeout_ms),
            validation_max_attempts: self.validation_attempts,
            validation_backoff: Duration::from_millis(self.validation_backoff_ms),
            synthetic_batch_size: self.synthetic_batch_size,
            synthetic_max_enqueue: self.synthetic_max_enqueue,
            synthetic_validation_wait: Duration::from_secs(self.synthetic_validation_wait_secs),
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("agentroute=info".parse()?))
        .with_target(true)
        .init();

    let config = Args::parse().into_config();
    let http_addr: SocketAddr = config.http_bind_addr.parse()?;

    // Built-in internal agents
    let registry = InternalAgentRegistry::new().with_agent("echo", Arc::new(EchoAgent));

    let (state, outbox_worker) = AppState::new(&config, registry);

    if let Some(path) = &config.agents_path {
        let count = state.store.load_catalog(path).await?;
        info!(path = %path, agents = count, "Agent catalog loaded");
    }

    if let Some(worker) = outbox_worker {
        tokio::spawn(worker.run());
    }

    let http_router = http::create_router(state);
    let http_listener = TcpListener::bind(http_addr).await?;

    info!(http_addr = %http_addr, "Starting agentroute control plane");

    axum::serve(http_listener, http_router).await?;

    Ok(())
}
