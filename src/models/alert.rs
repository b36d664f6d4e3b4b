//! This module defines the `Alert` struct, the unit of work flowing through
//! the delivery pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default maximum number of delivery retries for an alert.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Priority tier of an alert, from most to least urgent.
///
/// The wire representation is the integer level 1..=4; unknown levels fall
/// back to [`Priority::Normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Priority {
    /// Level 1: most urgent.
    Urgent,
    /// Level 2.
    High,
    /// Level 3: the default.
    #[default]
    Normal,
    /// Level 4: least urgent.
    Low,
}

impl Priority {
    /// The integer level of this priority (1=urgent .. 4=low).
    pub fn level(&self) -> u8 {
        match self {
            Priority::Urgent => 1,
            Priority::High => 2,
            Priority::Normal => 3,
            Priority::Low => 4,
        }
    }

    /// Maximum alerts per throttle window for an owner sending at this
    /// priority. More urgent traffic gets a higher ceiling.
    pub fn throttle_ceiling(&self) -> u32 {
        match self {
            Priority::Urgent => 100,
            Priority::High => 60,
            Priority::Normal => 30,
            Priority::Low => 10,
        }
    }
}

impl From<u8> for Priority {
    fn from(level: u8) -> Self {
        match level {
            1 => Priority::Urgent,
            2 => Priority::High,
            4 => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

/// Routing information selecting the outbound bot credential and destination
/// channel for an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRoute {
    /// The bot credential used to deliver this alert.
    pub bot_token: String,

    /// The destination channel identifier.
    pub channel_id: String,

    /// Back-reference to the configured channel record, for logging.
    pub channel_ref: Option<i64>,
}

/// The free-form payload carried by an alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    /// The message text to deliver.
    pub message: String,

    /// The routing identifier the caller addressed, echoed for logging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Arbitrary structured data attached by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl AlertPayload {
    /// Creates a payload carrying only a message text.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self { message: message.into(), identifier: None, data: None }
    }
}

/// A queued alert: one unit of routed notification work.
///
/// Created by the submission boundary, mutated only by the scheduler
/// (`retries`, `scheduled_at`) until it reaches a terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Opaque unique identifier.
    pub id: String,

    /// The owning user.
    pub owner_id: i64,

    /// Display name of the owning user, used when formatting messages.
    pub owner_name: String,

    /// The payload to deliver.
    pub payload: AlertPayload,

    /// Priority tier.
    pub priority: Priority,

    /// Number of delivery retries performed so far.
    pub retries: u32,

    /// Maximum number of delivery retries before the alert permanently fails.
    pub max_retries: u32,

    /// When the alert was created.
    pub created_at: DateTime<Utc>,

    /// When the alert becomes eligible for delivery. Advanced by the
    /// scheduler on each retry.
    pub scheduled_at: DateTime<Utc>,

    /// Outbound routing for this alert.
    pub route: DeliveryRoute,
}

impl Alert {
    /// Creates a new alert eligible for immediate delivery.
    pub fn new(
        owner_id: i64,
        owner_name: impl Into<String>,
        payload: AlertPayload,
        priority: Priority,
        route: DeliveryRoute,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id,
            owner_name: owner_name.into(),
            payload,
            priority,
            retries: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at: now,
            scheduled_at: now,
            route,
        }
    }

    /// Applies submission-time defaults: a zero retry limit becomes
    /// [`DEFAULT_MAX_RETRIES`] and `scheduled_at` is clamped so it never
    /// precedes `created_at`.
    pub fn normalize(&mut self) {
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.scheduled_at < self.created_at {
            self.scheduled_at = self.created_at;
        }
    }
}
