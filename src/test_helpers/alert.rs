//! Builder for `Alert` instances in tests.

use chrono::{DateTime, Utc};

use crate::models::{Alert, AlertPayload, DeliveryRoute, Priority};

/// A route pointing at a fixed test bot and channel.
pub fn test_route() -> DeliveryRoute {
    DeliveryRoute {
        bot_token: "test-bot-token".to_string(),
        channel_id: "-1001000".to_string(),
        channel_ref: Some(1),
    }
}

/// Builds alerts with sensible test defaults.
pub struct AlertBuilder {
    owner_id: i64,
    owner_name: String,
    message: String,
    data: Option<serde_json::Value>,
    priority: Priority,
    retries: u32,
    max_retries: u32,
    scheduled_at: Option<DateTime<Utc>>,
    route: DeliveryRoute,
}

impl AlertBuilder {
    /// Creates a builder for owner 1 with a normal-priority test message.
    pub fn new() -> Self {
        Self {
            owner_id: 1,
            owner_name: "tester".to_string(),
            message: "test alert".to_string(),
            data: None,
            priority: Priority::Normal,
            retries: 0,
            max_retries: 3,
            scheduled_at: None,
            route: test_route(),
        }
    }

    /// Sets the owning user id.
    pub fn owner_id(mut self, owner_id: i64) -> Self {
        self.owner_id = owner_id;
        self
    }

    /// Sets the owner's display name.
    pub fn owner_name(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = owner_name.into();
        self
    }

    /// Sets the message text.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attaches structured data.
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the priority tier.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the current retry count.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the retry limit.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Schedules delivery at a specific instant.
    pub fn scheduled_at(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }

    /// Sets the delivery route.
    pub fn route(mut self, route: DeliveryRoute) -> Self {
        self.route = route;
        self
    }

    /// Builds the alert.
    pub fn build(self) -> Alert {
        let payload = AlertPayload {
            message: self.message,
            identifier: None,
            data: self.data,
        };
        let mut alert =
            Alert::new(self.owner_id, self.owner_name, payload, self.priority, self.route);
        alert.retries = self.retries;
        alert.max_retries = self.max_retries;
        if let Some(scheduled_at) = self.scheduled_at {
            alert.scheduled_at = scheduled_at;
        }
        alert
    }
}

impl Default for AlertBuilder {
    fn default() -> Self {
        Self::new()
    }
}
