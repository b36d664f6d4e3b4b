//! The concrete processor adapting alerts to outbound messages.

use std::sync::Arc;

use async_trait::async_trait;

use crate::delivery::AlertSender;
use crate::models::{Alert, DeliveryStatus};
use crate::persistence::OutcomeStore;
use crate::rules::{RuleEngine, Verdict};

use super::{AlertProcessor, ProcessorError};

/// Delivers alerts through an [`AlertSender`], gating each attempt with the
/// rule engine and recording every terminal or filtered outcome.
///
/// The rule engine runs on every processing attempt, retries included, so a
/// retried alert is deduplicated against its own first attempt when the
/// backoff is shorter than the dedup window.
pub struct RelayProcessor {
    rules: Arc<RuleEngine>,
    sender: Arc<dyn AlertSender>,
    outcomes: Arc<dyn OutcomeStore>,
}

impl RelayProcessor {
    /// Creates a processor with the given rule engine, sender, and outcome
    /// store.
    pub fn new(
        rules: Arc<RuleEngine>,
        sender: Arc<dyn AlertSender>,
        outcomes: Arc<dyn OutcomeStore>,
    ) -> Self {
        Self { rules, sender, outcomes }
    }

    /// The rule engine gating this processor's deliveries.
    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    /// Records an outcome. Recording failures are logged and never fail the
    /// pipeline.
    async fn record(&self, alert: &Alert, detail: &str, status: DeliveryStatus) {
        if let Err(error) =
            self.outcomes.record_outcome(alert.owner_id, &alert.payload, detail, status).await
        {
            tracing::warn!(alert_id = %alert.id, %error, "Failed to record delivery outcome");
        }
    }
}

#[async_trait]
impl AlertProcessor for RelayProcessor {
    async fn process_alert(&self, alert: &Alert) -> Result<(), ProcessorError> {
        match self.rules.evaluate(alert) {
            Verdict::Rejected(reason) => {
                tracing::info!(alert_id = %alert.id, %reason, "Alert blocked");
                self.record(alert, &reason, DeliveryStatus::Filtered).await;
                // A filtered alert is a policy decision, not an error.
                return Ok(());
            }
            Verdict::Allowed => {}
        }

        match self
            .sender
            .send_formatted(&alert.route, &alert.owner_name, &alert.payload)
            .await
        {
            Ok(receipt) => {
                self.record(alert, &receipt, DeliveryStatus::Success).await;
                tracing::info!(
                    alert_id = %alert.id,
                    owner_id = alert.owner_id,
                    channel_id = %alert.route.channel_id,
                    "Alert processed successfully"
                );
                Ok(())
            }
            Err(error) => {
                self.record(alert, &error.to_string(), DeliveryStatus::Failed).await;
                Err(error.into())
            }
        }
    }

    async fn process_batch(&self, alerts: &[Alert]) -> Result<(), ProcessorError> {
        if alerts.is_empty() {
            return Ok(());
        }

        tracing::info!(count = alerts.len(), "Processing batch of alerts");

        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for alert in alerts {
            match self.process_alert(alert).await {
                Ok(()) => succeeded += 1,
                Err(error) => {
                    failed += 1;
                    tracing::warn!(alert_id = %alert.id, %error, "Batch: failed to process alert");
                }
            }
        }

        tracing::info!(succeeded, failed, "Batch complete");

        if failed > 0 && succeeded == 0 {
            return Err(ProcessorError::BatchFailed);
        }
        Ok(())
    }
}
