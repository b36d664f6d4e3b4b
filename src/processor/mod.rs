//! The pluggable delivery strategy invoked by the queue's workers and batch
//! aggregator.

mod relay;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

pub use relay::RelayProcessor;

use crate::delivery::SendError;
use crate::models::Alert;

/// Errors surfaced by an [`AlertProcessor`]. A processing error is treated as
/// transient by the queue and triggers retry scheduling.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The outbound send failed.
    #[error("delivery failed: {0}")]
    Send(#[from] SendError),

    /// Every alert in a batch failed.
    #[error("all alerts in batch failed")]
    BatchFailed,
}

/// A delivery strategy for alerts. The queue depends only on this
/// capability, so delivery backends (and test doubles) can be swapped.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertProcessor: Send + Sync {
    /// Processes a single alert to a terminal outcome. A returned error
    /// signals a transient failure eligible for retry.
    async fn process_alert(&self, alert: &Alert) -> Result<(), ProcessorError>;

    /// Processes a batch of alerts together. An error fails the whole batch
    /// and causes the queue to fall back to individual re-submission.
    async fn process_batch(&self, alerts: &[Alert]) -> Result<(), ProcessorError>;
}
