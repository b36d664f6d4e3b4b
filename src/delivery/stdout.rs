//! A sender that prints messages to standard output, used for local runs and
//! demos in place of a real transport.

use async_trait::async_trait;

use crate::models::{AlertPayload, DeliveryRoute};

use super::{AlertSender, SendError};

/// An [`AlertSender`] that writes every message to standard output.
#[derive(Debug, Default)]
pub struct StdoutSender;

impl StdoutSender {
    /// Creates a new stdout sender.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSender for StdoutSender {
    async fn send(&self, route: &DeliveryRoute, text: &str) -> Result<String, SendError> {
        println!("=== Alert to {} ===\n{}\n", route.channel_id, text);
        Ok(format!("stdout:{}", route.channel_id))
    }

    async fn send_formatted(
        &self,
        route: &DeliveryRoute,
        owner_name: &str,
        payload: &AlertPayload,
    ) -> Result<String, SendError> {
        let mut text = format!("🔔 Alert from {owner_name}\n\n{}", payload.message);
        if let Some(data) = &payload.data {
            text.push_str("\n\n");
            text.push_str(
                &serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()),
            );
        }
        self.send(route, &text).await
    }
}
