//! The outbound sender boundary.
//!
//! Transport implementations (the Telegram HTTP client) live outside this
//! crate; the pipeline depends only on the [`AlertSender`] capability. A
//! sender implementation is responsible for enforcing its own outbound rate
//! ceiling — [`limits::SendLimiterSet`] provides the per-credential and
//! per-channel counters for that.

pub mod limits;
mod stdout;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

pub use stdout::StdoutSender;

use crate::models::{AlertPayload, DeliveryRoute};

/// Errors surfaced by an [`AlertSender`]. All variants are treated as
/// transient by the pipeline and are eligible for retry.
#[derive(Debug, Error)]
pub enum SendError {
    /// The sender is missing required configuration for this route.
    #[error("sender not configured: {0}")]
    NotConfigured(String),

    /// The sender's own outbound ceiling rejected the send.
    #[error("outbound rate limit exceeded for {scope}")]
    RateLimited {
        /// The limited scope, e.g. a bot credential or a channel.
        scope: String,
    },

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The outbound send capability consumed by the processor.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertSender: Send + Sync {
    /// Sends pre-formatted text to the route's destination channel,
    /// returning a delivery receipt.
    async fn send(&self, route: &DeliveryRoute, text: &str) -> Result<String, SendError>;

    /// Formats and sends a structured payload on behalf of an owner,
    /// returning a delivery receipt.
    async fn send_formatted(
        &self,
        route: &DeliveryRoute,
        owner_name: &str,
        payload: &AlertPayload,
    ) -> Result<String, SendError>;
}
