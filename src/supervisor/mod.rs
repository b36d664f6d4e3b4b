//! The Supervisor owns the delivery pipeline's lifecycle.
//!
//! The `SupervisorBuilder` wires the rule engine, processor, and queue
//! together from the application configuration; the `Supervisor` listens for
//! shutdown signals (Ctrl+C or SIGTERM), runs the dedup cache's background
//! sweep, and orchestrates a timeout-bound graceful shutdown of the queue.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::{signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{config::AppConfig, queue::AlertQueue, rules::RuleEngine};

/// Represents the set of errors that can occur while assembling or running
/// the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// An alert sender was not provided to the `SupervisorBuilder`.
    #[error("Missing alert sender for Supervisor")]
    MissingSender,

    /// An outcome store was not provided to the `SupervisorBuilder`.
    #[error("Missing outcome store for Supervisor")]
    MissingOutcomeStore,
}

/// The primary runtime manager for the relay pipeline.
pub struct Supervisor {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The alert queue and its worker pool.
    queue: Arc<AlertQueue>,

    /// The rule engine gating deliveries; owns the dedup cache whose sweeper
    /// the supervisor runs.
    rules: Arc<RuleEngine>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,

    /// Auxiliary tasks (signal listener, dedup sweeper) managed by the
    /// supervisor.
    join_set: JoinSet<()>,
}

impl Supervisor {
    /// Returns a new `SupervisorBuilder` instance, the public entry point
    /// for creating a supervisor.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// The queue handle, for wiring the submission boundary.
    pub fn queue(&self) -> Arc<AlertQueue> {
        Arc::clone(&self.queue)
    }

    /// The rule engine handle, for dynamic rule registration.
    pub fn rules(&self) -> Arc<RuleEngine> {
        Arc::clone(&self.rules)
    }

    /// A clone of the shutdown token, letting embedders trigger a graceful
    /// shutdown programmatically.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Runs the pipeline until a shutdown signal arrives, then stops the
    /// queue within the configured timeout.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let cancellation_token = self.cancellation_token.clone();

        // Listen for shutdown signals.
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM handler")
                    .recv()
                    .await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
            }

            cancellation_token.cancel();
        });

        // Run the dedup cache's periodic sweep alongside the pipeline.
        let deduplication = self.rules.deduplication();
        let sweep_interval = self.config.dedup_sweep_interval_secs;
        let sweeper_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            deduplication.run_sweeper(sweep_interval, sweeper_token).await;
        });

        tracing::info!("Relay pipeline started");
        self.cancellation_token.cancelled().await;

        // Graceful shutdown: stop the queue (draining buffered work and
        // flushing the batch remainder), bounded by the configured timeout.
        let shutdown_timeout = self.config.shutdown_timeout_secs;
        if tokio::time::timeout(shutdown_timeout, self.queue.stop()).await.is_err() {
            tracing::warn!(
                "Queue did not stop within {:?}. Continuing shutdown.",
                shutdown_timeout
            );
        }

        self.join_set.shutdown().await;
        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::{config::AppConfig, delivery::StdoutSender, persistence::LogOutcomeStore};

    #[tokio::test]
    async fn builder_requires_every_dependency() {
        let result = Supervisor::builder().build();
        assert!(matches!(result, Err(SupervisorError::MissingConfig)));

        let result = Supervisor::builder().config(AppConfig::default()).build();
        assert!(matches!(result, Err(SupervisorError::MissingSender)));

        let result = Supervisor::builder()
            .config(AppConfig::default())
            .sender(Arc::new(StdoutSender::new()))
            .build();
        assert!(matches!(result, Err(SupervisorError::MissingOutcomeStore)));
    }

    #[tokio::test]
    async fn run_exits_after_cancellation() {
        let supervisor = Supervisor::builder()
            .config(AppConfig { workers: 1, queue_size: 4, ..AppConfig::default() })
            .sender(Arc::new(StdoutSender::new()))
            .outcome_store(Arc::new(LogOutcomeStore::new()))
            .build()
            .unwrap();

        let token = supervisor.cancellation_token();
        let handle = tokio::spawn(supervisor.run());
        token.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("supervisor did not stop")
            .expect("supervisor task panicked")
            .expect("supervisor returned an error");
    }
}
