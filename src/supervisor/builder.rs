//! Builder assembling the supervisor and its pipeline.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    delivery::AlertSender,
    persistence::OutcomeStore,
    processor::RelayProcessor,
    queue::AlertQueue,
    rules::{default_rules, RuleEngine},
};

use super::{Supervisor, SupervisorError};

/// A builder for constructing a [`Supervisor`] with all its required
/// components.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    sender: Option<Arc<dyn AlertSender>>,
    outcome_store: Option<Arc<dyn OutcomeStore>>,
}

impl SupervisorBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the outbound sender.
    pub fn sender(mut self, sender: Arc<dyn AlertSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Sets the outcome store.
    pub fn outcome_store(mut self, outcome_store: Arc<dyn OutcomeStore>) -> Self {
        self.outcome_store = Some(outcome_store);
        self
    }

    /// Wires the rule engine, processor, and queue together and starts the
    /// queue's worker pool.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let sender = self.sender.ok_or(SupervisorError::MissingSender)?;
        let outcome_store = self.outcome_store.ok_or(SupervisorError::MissingOutcomeStore)?;

        let rules = Arc::new(RuleEngine::new(config.dedup_window_secs));
        for rule in default_rules(&config.spam_keywords) {
            rules.add_rule(rule);
        }
        tracing::info!(spam_keywords = config.spam_keywords.len(), "Default alert rules initialized");

        let processor =
            Arc::new(RelayProcessor::new(Arc::clone(&rules), sender, outcome_store));
        let queue = Arc::new(AlertQueue::start(config.queue_config(), processor));

        Ok(Supervisor {
            config: Arc::new(config),
            queue,
            rules,
            cancellation_token: CancellationToken::new(),
            join_set: tokio::task::JoinSet::new(),
        })
    }
}
