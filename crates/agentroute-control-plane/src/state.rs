//! Shared application state.

use std::sync::Arc;

use tracing::info;

use crate::capability::CapabilityStore;
use crate::config::Config;
use crate::dispatcher::{Dispatcher, InternalAgentRegistry};
use crate::learning::ValidationLedger;
use crate::orchestrator::SyntheticTaskOrchestrator;
use crate::router::TaskRouter;
use crate::telemetry::TelemetryRecorder;
use crate::validation::{
    HttpValidationClient, OutboxWorker, RetryPolicy, ValidationClient, ValidationOutbox,
};

/// Shared application state.
pub struct AppState {
    /// Registered agents and their learned statistics.
    pub store: Arc<CapabilityStore>,

    /// Validation events, the source of every learned statistic.
    pub ledger: Arc<ValidationLedger>,

    /// Routing pipeline.
    pub router: TaskRouter,

    /// Synthetic evaluation batches.
    pub orchestrator: SyntheticTaskOrchestrator,
}

impl AppState {
    /// Build the state from `config`. The validation collaborator is reached
    /// over HTTP when `config.validator_url` is set.
    ///
    /// The returned worker, if any, must be spawned for validations to run.
    pub fn new(config: &Config, internal: InternalAgentRegistry) -> (Arc<Self>, Option<OutboxWorker>) {
        let client = config.validator_url.as_ref().map(|url| {
            Arc::new(HttpValidationClient::new(url.clone(), config.validator_timeout))
                as Arc<dyn ValidationClient>
        });
        Self::with_validation_client(config, internal, client)
    }

    /// Build the state with an explicit validation collaborator.
    pub fn with_validation_client(
        config: &Config,
        internal: InternalAgentRegistry,
        client: Option<Arc<dyn ValidationClient>>,
    ) -> (Arc<Self>, Option<OutboxWorker>) {
        let ledger = Arc::new(ValidationLedger::new());
        let store = Arc::new(CapabilityStore::new(ledger.clone()));

        let (outbox, worker) = match client {
            Some(client) => {
                let policy = RetryPolicy {
                    max_attempts: config.validation_max_attempts,
                    base_backoff: config.validation_backoff,
                };
                let (outbox, worker) = ValidationOutbox::new(client, ledger.clone(), policy);
                (outbox, Some(worker))
            }
            None => {
                info!("No validator configured - validation disabled");
                (ValidationOutbox::disabled(), None)
            }
        };

        let router = TaskRouter::new(
            store.clone(),
            Dispatcher::new(internal, config.agent_timeout),
            TelemetryRecorder::in_memory(),
            outbox,
            config.ranking.clone(),
        );
        let orchestrator = SyntheticTaskOrchestrator::new(
            router.clone(),
            store.clone(),
            config.synthetic_batch_size,
            config.synthetic_validation_wait,
        )
        .with_max_enqueue(config.synthetic_max_enqueue);

        let state = Arc::new(Self {
            store,
            ledger,
            router,
            orchestrator,
        });
        (state, worker)
    }
}
