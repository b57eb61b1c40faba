//! Control plane configuration.

use std::time::Duration;

use crate::orchestrator::DEFAULT_MAX_ENQUEUE;
use crate::ranking::RankingWeights;

/// Control plane configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub http_bind_addr: String,

    /// JSON agent catalog loaded at start-up.
    pub agents_path: Option<String>,

    /// Validation collaborator endpoint. Validation is disabled when unset.
    pub validator_url: Option<String>,

    /// Bound on every outbound agent call.
    pub agent_timeout: Duration,

    /// Bound on one validation collaborator call.
    pub validator_timeout: Duration,

    /// Attempts per validation job before giving up.
    pub validation_max_attempts: u32,

    /// Backoff before the second attempt; doubled for every further one.
    pub validation_backoff: Duration,

    /// Synthetic tasks picked up per batch.
    pub synthetic_batch_size: usize,

    /// Most synthetic tasks one enqueue request may create.
    pub synthetic_max_enqueue: usize,

    /// How long a synthetic task waits for its validation event.
    pub synthetic_validation_wait: Duration,

    /// Ranking weights and thresholds.
    pub ranking: RankingWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind_addr: "127.0.0.1:8080".to_string(),
            agents_path: None,
            validator_url: None,
            agent_timeout: Duration::from_secs(30),
            validator_timeout: Duration::from_secs(30),
            validation_max_attempts: 3,
            validation_backoff: Duration::from_millis(500),
            synthetic_batch_size: 10,
            synthetic_max_enqueue: DEFAULT_MAX_ENQUEUE,
            synthetic_validation_wait: Duration::from_secs(60),
            ranking: RankingWeights::default(),
        }
    }
}
