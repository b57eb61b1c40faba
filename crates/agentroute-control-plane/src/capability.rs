//! Capability store: registered agents, their declared contracts and the
//! learned statistics derived from the validation ledger.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use agentroute_core::{AgentDescriptor, AgentId, CapabilityDescriptor, CapabilitySnapshot};

use crate::learning::ValidationLedger;

/// Errors while loading the agent catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read agent catalog '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid agent catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate agent slug: {0}")]
    DuplicateSlug(String),
}

/// One entry of the agent catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub descriptor: AgentDescriptor,

    #[serde(default)]
    pub capabilities: CapabilityDescriptor,
}

#[derive(Debug, Clone, Copy, Default)]
struct LatencyStats {
    total_ms: u64,
    samples: u64,
}

impl LatencyStats {
    fn average(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.total_ms as f64 / self.samples as f64)
    }
}

/// A registered agent.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub descriptor: AgentDescriptor,
    pub capabilities: CapabilityDescriptor,
    latency: LatencyStats,
}

impl AgentRecord {
    /// Mean observed latency, if any execution was recorded.
    pub fn average_latency_ms(&self) -> Option<f64> {
        self.latency.average()
    }
}

/// Registry of agents plus their learned performance.
pub struct CapabilityStore {
    agents: RwLock<HashMap<AgentId, AgentRecord>>,
    ledger: Arc<ValidationLedger>,
}

impl CapabilityStore {
    /// Create an empty store backed by `ledger`.
    pub fn new(ledger: Arc<ValidationLedger>) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            ledger,
        }
    }

    /// The validation ledger the learned statistics are folded from.
    pub fn ledger(&self) -> &Arc<ValidationLedger> {
        &self.ledger
    }

    /// Register or replace an agent.
    pub async fn register(&self, descriptor: AgentDescriptor, capabilities: CapabilityDescriptor) {
        let mut agents = self.agents.write().await;
        let latency = agents
            .get(&descriptor.id)
            .map(|existing| existing.latency)
            .unwrap_or_default();
        agents.insert(
            descriptor.id.clone(),
            AgentRecord {
                descriptor,
                capabilities,
                latency,
            },
        );
    }

    /// Load agents from a JSON catalog file. Returns the number of agents
    /// registered.
    pub async fn load_catalog(&self, path: impl AsRef<Path>) -> Result<usize, CatalogError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)?;
        self.register_catalog(entries).await
    }

    /// Register catalog entries, rejecting duplicate slugs.
    pub async fn register_catalog(&self, entries: Vec<CatalogEntry>) -> Result<usize, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.descriptor.slug.as_str()) {
                return Err(CatalogError::DuplicateSlug(entry.descriptor.slug.clone()));
            }
        }

        let count = entries.len();
        for entry in entries {
            info!(
                agent = %entry.descriptor.slug,
                status = ?entry.descriptor.status,
                mode = ?entry.descriptor.invocation.mode,
                "Registered agent"
            );
            self.register(entry.descriptor, entry.capabilities).await;
        }
        Ok(count)
    }

    /// Get an agent by id.
    pub async fn get(&self, agent_id: &AgentId) -> Option<AgentRecord> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// All agents, ordered by slug.
    pub async fn list(&self) -> Vec<AgentRecord> {
        let mut records: Vec<AgentRecord> = self.agents.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.descriptor.slug.cmp(&b.descriptor.slug));
        records
    }

    /// Record one execution latency. Merged as an increment under the write
    /// lock so concurrent executions all count.
    pub async fn record_latency(&self, agent_id: &AgentId, latency_ms: u64) {
        if let Some(record) = self.agents.write().await.get_mut(agent_id) {
            record.latency.total_ms = record.latency.total_ms.saturating_add(latency_ms);
            record.latency.samples += 1;
        }
    }

    /// Current snapshot of one agent.
    pub async fn snapshot(&self, agent_id: &AgentId) -> Option<CapabilitySnapshot> {
        let record = self.get(agent_id).await?;
        Some(self.snapshot_of(&record).await)
    }

    /// Snapshot of an already fetched record.
    pub async fn snapshot_of(&self, record: &AgentRecord) -> CapabilitySnapshot {
        let stats = self.ledger.stats_for(&record.descriptor.id).await;
        CapabilitySnapshot {
            agent_id: record.descriptor.id.clone(),
            supported_task_types: record
                .capabilities
                .effective_task_types(record.descriptor.domain.as_deref()),
            input_format: record.capabilities.input_format().name().to_string(),
            recent_success_rate: stats.recent_success_rate,
            success_rate: stats.success_rate,
            average_validator_score: stats.average_validator_score,
            validation_count: stats.validation_count,
            average_latency_ms: record.average_latency_ms(),
            trend: stats.trend,
        }
    }

    /// Number of agents per status.
    pub async fn count_by_status(&self) -> HashMap<agentroute_core::AgentStatus, usize> {
        let mut counts = HashMap::new();
        for record in self.agents.read().await.values() {
            *counts.entry(record.descriptor.status).or_insert(0) += 1;
        }
        counts
    }
}
