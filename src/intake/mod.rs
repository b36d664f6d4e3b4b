//! The alert submission boundary.
//!
//! The HTTP layer itself is external; this module owns everything between a
//! parsed webhook body and the queue: splitting the routing identifier off
//! the message, resolving it to a bot/channel pair, building the alert, and
//! surfacing queue rejection as a retryable error.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Alert, AlertPayload, DeliveryRoute, Priority};
use crate::queue::{AlertQueue, QueueError};

/// Separator between message content and the routing identifier.
const ROUTING_SEPARATOR: &str = "----";

/// The parsed body of an inbound webhook request.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Message text, optionally carrying a trailing
    /// `"\n----\n<identifier>"` routing suffix.
    pub message: String,

    /// Priority level 1..=4; out-of-range or missing values fall back to
    /// normal.
    #[serde(default)]
    pub priority: Option<u8>,

    /// Arbitrary structured data forwarded with the alert.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// The identity of the submitting user, established by the external
/// authentication layer.
#[derive(Debug, Clone)]
pub struct OwnerIdentity {
    /// The owner's id.
    pub id: i64,
    /// The owner's display name.
    pub name: String,
}

/// A resolved routing target for an identifier.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    /// Display name of the configured channel.
    pub channel_name: String,
    /// The outbound route.
    pub route: DeliveryRoute,
}

/// Errors from resolving a routing identifier.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No active channel is configured under this identifier.
    #[error("channel identifier '{0}' not found or inactive")]
    NotFound(String),

    /// The resolver's backing store failed.
    #[error("route lookup failed: {0}")]
    Lookup(String),
}

/// Resolves a (owner, identifier) pair to a configured bot/channel route.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RouteResolver: Send + Sync {
    /// Looks up the route configured by `owner_id` under `identifier`.
    async fn resolve(&self, owner_id: i64, identifier: &str) -> Result<ResolvedRoute, ResolveError>;
}

/// A [`RouteResolver`] backed by routes declared in the configuration file,
/// for deployments without an external store.
#[derive(Debug, Default)]
pub struct StaticRouteResolver {
    routes: HashMap<(i64, String), ResolvedRoute>,
}

impl StaticRouteResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route for an owner under an identifier.
    pub fn insert(&mut self, owner_id: i64, identifier: impl Into<String>, route: ResolvedRoute) {
        self.routes.insert((owner_id, identifier.into()), route);
    }
}

#[async_trait]
impl RouteResolver for StaticRouteResolver {
    async fn resolve(&self, owner_id: i64, identifier: &str) -> Result<ResolvedRoute, ResolveError> {
        self.routes
            .get(&(owner_id, identifier.to_string()))
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(identifier.to_string()))
    }
}

/// Validation and submission errors surfaced to the original caller.
///
/// Only these are visible to the submitter; all downstream pipeline outcomes
/// are observable via logs and stats alone.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The message field was empty.
    #[error("message field is required")]
    EmptyMessage,

    /// No routing identifier was found in the message.
    #[error("channel identifier not found; message format: '<content>\\n----\\n<identifier>'")]
    MissingIdentifier,

    /// The identifier did not resolve to a configured channel.
    #[error(transparent)]
    UnknownIdentifier(#[from] ResolveError),

    /// The queue is at capacity; the caller should retry later.
    #[error("alert queue is full, please try again later")]
    Unavailable,

    /// The service is shutting down.
    #[error("service is shutting down")]
    ShuttingDown,
}

/// Acknowledgment returned to the submitter once an alert is queued.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    /// The queued alert's id.
    pub alert_id: String,
    /// Display name of the resolved channel.
    pub channel_name: String,
    /// The routing identifier that was addressed.
    pub identifier: String,
}

/// Splits the routing identifier off a message.
///
/// Content before the first separator and the identifier between the first
/// and second separators are both trimmed. Returns `None` when the message
/// carries no (non-empty) identifier.
pub fn split_routing_suffix(message: &str) -> (Option<&str>, &str) {
    let mut parts = message.split(ROUTING_SEPARATOR);
    let content = parts.next().unwrap_or(message).trim();
    match parts.next().map(str::trim) {
        Some(identifier) if !identifier.is_empty() => (Some(identifier), content),
        _ => (None, content),
    }
}

/// Builds alerts from webhook submissions and enqueues them.
pub struct IntakeService {
    resolver: Arc<dyn RouteResolver>,
    queue: Arc<AlertQueue>,
}

impl IntakeService {
    /// Creates an intake service submitting into `queue`.
    pub fn new(resolver: Arc<dyn RouteResolver>, queue: Arc<AlertQueue>) -> Self {
        Self { resolver, queue }
    }

    /// Validates a webhook submission, resolves its routing identifier, and
    /// enqueues the alert.
    ///
    /// Delivery is fire-and-forget from the caller's perspective: a returned
    /// receipt only acknowledges queueing.
    pub async fn submit(
        &self,
        owner: &OwnerIdentity,
        payload: WebhookPayload,
    ) -> Result<SubmitReceipt, IntakeError> {
        if payload.message.is_empty() {
            return Err(IntakeError::EmptyMessage);
        }

        let (identifier, content) = split_routing_suffix(&payload.message);
        let identifier = identifier.ok_or(IntakeError::MissingIdentifier)?;

        let resolved = self.resolver.resolve(owner.id, identifier).await?;

        let priority = payload.priority.map(Priority::from).unwrap_or_default();
        let alert_payload = AlertPayload {
            message: content.to_string(),
            identifier: Some(identifier.to_string()),
            data: payload.data,
        };

        let alert =
            Alert::new(owner.id, owner.name.clone(), alert_payload, priority, resolved.route);
        let alert_id = alert.id.clone();

        self.queue.enqueue(alert).map_err(|error| {
            tracing::warn!(owner_id = owner.id, %error, "Failed to enqueue alert");
            match error {
                QueueError::Full => IntakeError::Unavailable,
                QueueError::ShuttingDown => IntakeError::ShuttingDown,
            }
        })?;

        Ok(SubmitReceipt {
            alert_id,
            channel_name: resolved.channel_name,
            identifier: identifier.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::MockAlertProcessor;
    use crate::queue::QueueConfig;

    #[test]
    fn splits_content_and_identifier() {
        let (identifier, content) = split_routing_suffix("disk full\n----\nops-alerts");
        assert_eq!(identifier, Some("ops-alerts"));
        assert_eq!(content, "disk full");
    }

    #[test]
    fn missing_separator_yields_no_identifier() {
        let (identifier, content) = split_routing_suffix("disk full");
        assert_eq!(identifier, None);
        assert_eq!(content, "disk full");
    }

    #[test]
    fn empty_identifier_yields_none() {
        let (identifier, _) = split_routing_suffix("disk full\n----\n  ");
        assert_eq!(identifier, None);
    }

    #[test]
    fn extra_separators_keep_the_first_identifier_segment() {
        let (identifier, content) = split_routing_suffix("a----b----c");
        assert_eq!(identifier, Some("b"));
        assert_eq!(content, "a");
    }

    fn ops_resolver() -> Arc<StaticRouteResolver> {
        let mut resolver = StaticRouteResolver::new();
        resolver.insert(
            1,
            "ops-alerts",
            ResolvedRoute {
                channel_name: "Ops".to_string(),
                route: DeliveryRoute {
                    bot_token: "token".to_string(),
                    channel_id: "-100123".to_string(),
                    channel_ref: Some(7),
                },
            },
        );
        Arc::new(resolver)
    }

    fn started_queue() -> Arc<AlertQueue> {
        let mut processor = MockAlertProcessor::new();
        processor.expect_process_alert().returning(|_| Ok(()));
        let config = QueueConfig { workers: 1, queue_size: 4, ..QueueConfig::default() };
        Arc::new(AlertQueue::start(config, Arc::new(processor)))
    }

    #[tokio::test]
    async fn submit_resolves_and_enqueues() {
        let intake = IntakeService::new(ops_resolver(), started_queue());
        let owner = OwnerIdentity { id: 1, name: "alice".to_string() };

        let receipt = intake
            .submit(
                &owner,
                WebhookPayload {
                    message: "disk full\n----\nops-alerts".to_string(),
                    priority: Some(2),
                    data: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.channel_name, "Ops");
        assert_eq!(receipt.identifier, "ops-alerts");
        assert!(!receipt.alert_id.is_empty());
    }

    #[tokio::test]
    async fn submit_rejects_empty_and_unrouted_messages() {
        let intake = IntakeService::new(ops_resolver(), started_queue());
        let owner = OwnerIdentity { id: 1, name: "alice".to_string() };

        let result = intake
            .submit(
                &owner,
                WebhookPayload { message: String::new(), priority: None, data: None },
            )
            .await;
        assert!(matches!(result, Err(IntakeError::EmptyMessage)));

        let result = intake
            .submit(
                &owner,
                WebhookPayload { message: "no suffix here".to_string(), priority: None, data: None },
            )
            .await;
        assert!(matches!(result, Err(IntakeError::MissingIdentifier)));

        let result = intake
            .submit(
                &owner,
                WebhookPayload {
                    message: "hello\n----\nunknown".to_string(),
                    priority: None,
                    data: None,
                },
            )
            .await;
        assert!(matches!(result, Err(IntakeError::UnknownIdentifier(_))));
    }

    #[tokio::test]
    async fn submit_surfaces_shutdown_as_an_error() {
        let queue = started_queue();
        queue.stop().await;
        let intake = IntakeService::new(ops_resolver(), queue);
        let owner = OwnerIdentity { id: 1, name: "alice".to_string() };

        let result = intake
            .submit(
                &owner,
                WebhookPayload {
                    message: "disk full\n----\nops-alerts".to_string(),
                    priority: None,
                    data: None,
                },
            )
            .await;
        assert!(matches!(result, Err(IntakeError::ShuttingDown)));
    }

    #[tokio::test]
    async fn static_resolver_round_trips() {
        let mut resolver = StaticRouteResolver::new();
        resolver.insert(
            1,
            "ops-alerts",
            ResolvedRoute {
                channel_name: "Ops".to_string(),
                route: DeliveryRoute {
                    bot_token: "token".to_string(),
                    channel_id: "-100123".to_string(),
                    channel_ref: Some(7),
                },
            },
        );

        let resolved = resolver.resolve(1, "ops-alerts").await.unwrap();
        assert_eq!(resolved.channel_name, "Ops");
        assert!(matches!(resolver.resolve(1, "unknown").await, Err(ResolveError::NotFound(_))));
        assert!(matches!(resolver.resolve(2, "ops-alerts").await, Err(ResolveError::NotFound(_))));
    }
}
