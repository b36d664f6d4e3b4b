//! Terminal outcome and statistics read models exposed at the crate's
//! boundaries.

use serde::{Deserialize, Serialize};

/// The recorded status of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The alert was delivered.
    Success,
    /// The delivery attempt failed.
    Failed,
    /// The alert was suppressed by the rule engine.
    Filtered,
    /// The alert is awaiting delivery.
    Pending,
}

impl DeliveryStatus {
    /// The canonical string form used by the outcome log.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Filtered => "filtered",
            DeliveryStatus::Pending => "pending",
        }
    }
}

/// A point-in-time snapshot of the queue counters, exposed for external
/// polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatsSnapshot {
    /// Alerts delivered (individually or as part of a batch).
    pub processed: u64,
    /// Delivery failures, including the final failure of an exhausted alert.
    pub failed: u64,
    /// Retry schedulings performed.
    pub retried: u64,
    /// Alerts delivered through the batch path.
    pub batched: u64,
    /// Alerts currently buffered in the work channel.
    pub current_size: u64,
}
