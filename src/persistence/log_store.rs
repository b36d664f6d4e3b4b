use async_trait::async_trait;

use crate::models::{AlertPayload, DeliveryStatus};

use super::{OutcomeError, OutcomeStore};

/// An [`OutcomeStore`] that records outcomes to the process log, used when no
/// relational store is wired in.
#[derive(Debug, Default)]
pub struct LogOutcomeStore;

impl LogOutcomeStore {
    /// Creates a new log-backed outcome store.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutcomeStore for LogOutcomeStore {
    async fn record_outcome(
        &self,
        owner_id: i64,
        payload: &AlertPayload,
        detail: &str,
        status: DeliveryStatus,
    ) -> Result<(), OutcomeError> {
        tracing::info!(
            owner_id,
            status = status.as_str(),
            detail,
            message = %payload.message,
            "Delivery outcome"
        );
        Ok(())
    }
}
