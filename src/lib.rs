#![warn(missing_docs)]
//! Hookrelay is a multi-tenant webhook-to-Telegram relay: callers POST alerts
//! to a per-user webhook URL and the service routes each alert to a configured
//! bot/channel pair, applying deduplication, throttling, filtering, retry with
//! exponential backoff, and batching before delivery.

pub mod config;
pub mod delivery;
pub mod intake;
pub mod models;
pub mod persistence;
pub mod processor;
pub mod queue;
pub mod rules;
pub mod supervisor;
pub mod test_helpers;
