//! Configuration module for hookrelay.

mod app_config;
mod helpers;

pub use app_config::{AppConfig, RouteConfig};
pub use helpers::{deserialize_duration_from_seconds, serialize_duration_to_seconds};
