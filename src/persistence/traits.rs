use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::models::{AlertPayload, DeliveryStatus};

use super::OutcomeError;

/// Records the terminal or filtered outcome of every processed alert.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Records one delivery outcome for an owner's alert.
    async fn record_outcome(
        &self,
        owner_id: i64,
        payload: &AlertPayload,
        detail: &str,
        status: DeliveryStatus,
    ) -> Result<(), OutcomeError>;
}
