use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::deserialize_duration_from_seconds;
use crate::queue::QueueConfig;

/// Provides the default value for workers.
fn default_workers() -> usize {
    20
}

/// Provides the default value for queue_size.
fn default_queue_size() -> usize {
    15_000
}

/// Provides the default value for dedup_window.
fn default_dedup_window() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for dedup_sweep_interval.
fn default_dedup_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

/// Provides the default value for batch_size.
fn default_batch_size() -> usize {
    10
}

/// Provides the default value for batch_interval.
fn default_batch_interval() -> Duration {
    Duration::from_secs(5)
}

/// Provides the default value for retry_max_backoff.
fn default_retry_max_backoff() -> Duration {
    Duration::from_secs(300)
}

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default spam keyword list.
fn default_spam_keywords() -> Vec<String> {
    ["viagra", "casino", "lottery"].map(String::from).to_vec()
}

/// A routing target declared in the configuration file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// The owning user's id.
    pub owner_id: i64,
    /// The identifier callers address in the message suffix.
    pub identifier: String,
    /// Display name for the channel.
    pub channel_name: String,
    /// Bot credential used for this route.
    pub bot_token: String,
    /// Destination channel id.
    pub channel_id: String,
    /// Optional back-reference for logging.
    #[serde(default)]
    pub channel_ref: Option<i64>,
}

/// Application configuration for hookrelay.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Number of concurrent delivery workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the bounded work channel.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Time span within which identical (owner, message) pairs are
    /// suppressed.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_dedup_window"
    )]
    pub dedup_window_secs: Duration,

    /// Interval of the background sweep evicting expired dedup entries.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_dedup_sweep_interval"
    )]
    pub dedup_sweep_interval_secs: Duration,

    /// Flush threshold of the batch aggregator.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Flush interval of the batch aggregator.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_batch_interval"
    )]
    pub batch_interval_secs: Duration,

    /// Upper bound on the exponential retry backoff.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_retry_max_backoff"
    )]
    pub retry_max_backoff_secs: Duration,

    /// The maximum time to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout_secs: Duration,

    /// Keywords whose presence in a message blocks delivery.
    #[serde(default = "default_spam_keywords")]
    pub spam_keywords: Vec<String>,

    /// Statically declared routing targets.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_size: default_queue_size(),
            dedup_window_secs: default_dedup_window(),
            dedup_sweep_interval_secs: default_dedup_sweep_interval(),
            batch_size: default_batch_size(),
            batch_interval_secs: default_batch_interval(),
            retry_max_backoff_secs: default_retry_max_backoff(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            spam_keywords: default_spam_keywords(),
            routes: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading `app.yaml` from the
    /// configuration directory (when present) layered under
    /// `HOOKRELAY__`-prefixed environment variables.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)).required(false))
            .add_source(Environment::with_prefix("HOOKRELAY").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// The queue sizing derived from this configuration.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            workers: self.workers,
            queue_size: self.queue_size,
            batch_size: self.batch_size,
            batch_interval: self.batch_interval_secs,
            retry_max_backoff: self.retry_max_backoff_secs,
        }
    }
}
