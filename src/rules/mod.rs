//! The rule engine gating what gets delivered: deduplication, per-owner
//! throttling, and pluggable filter predicates composed into a single
//! accept/reject decision.

mod dedup;
mod throttle;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub use dedup::DeduplicationCache;
pub use throttle::ThrottleManager;

use crate::models::Alert;

/// The outcome of evaluating an alert against the rule engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The alert may be delivered.
    Allowed,
    /// The alert is suppressed, with the reason recorded to the outcome log.
    Rejected(String),
}

impl Verdict {
    /// Whether the alert passed every check.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

/// A named filter predicate over alerts.
///
/// Rules are registered at startup (or dynamically) and never mutated
/// afterwards; the engine evaluates them in registration order.
pub struct AlertRule {
    /// Name reported in rejection reasons.
    pub name: String,
    /// Disabled rules are skipped during evaluation.
    pub enabled: bool,
    filter: Box<dyn Fn(&Alert) -> bool + Send + Sync>,
}

impl AlertRule {
    /// Creates an enabled rule whose predicate returns `true` for alerts
    /// that should pass.
    pub fn new(
        name: impl Into<String>,
        filter: impl Fn(&Alert) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), enabled: true, filter: Box::new(filter) }
    }

    fn passes(&self, alert: &Alert) -> bool {
        (self.filter)(alert)
    }
}

impl std::fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertRule")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Composes deduplication, throttling, and custom rules into one decision.
///
/// Checks short-circuit on the first rejection; the dedup record and the
/// throttle increment are irreversible side effects of the call and are not
/// reverted when a later stage rejects.
pub struct RuleEngine {
    rules: RwLock<Vec<AlertRule>>,
    deduplication: Arc<DeduplicationCache>,
    throttle: ThrottleManager,
}

impl RuleEngine {
    /// Creates a rule engine with the given deduplication window and no
    /// custom rules.
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            deduplication: Arc::new(DeduplicationCache::new(dedup_window)),
            throttle: ThrottleManager::new(),
        }
    }

    /// Registers a rule. Rules are evaluated in registration order.
    pub fn add_rule(&self, rule: AlertRule) {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        rules.push(rule);
    }

    /// The shared deduplication cache, for spawning its sweeper.
    pub fn deduplication(&self) -> Arc<DeduplicationCache> {
        Arc::clone(&self.deduplication)
    }

    /// Evaluates every check against an alert, returning the first
    /// rejection or [`Verdict::Allowed`].
    pub fn evaluate(&self, alert: &Alert) -> Verdict {
        if self.deduplication.is_duplicate(alert) {
            return Verdict::Rejected("duplicate alert filtered".to_string());
        }

        if !self.throttle.allow(alert.owner_id, alert.priority) {
            return Verdict::Rejected("rate limit exceeded".to_string());
        }

        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        for rule in rules.iter() {
            if !rule.enabled {
                continue;
            }
            if !rule.passes(alert) {
                return Verdict::Rejected(format!("filtered by rule: {}", rule.name));
            }
        }

        Verdict::Allowed
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine").field("deduplication", &self.deduplication).finish_non_exhaustive()
    }
}

/// The default rule set: reject empty messages and messages containing a
/// configured spam keyword.
///
/// Keyword matching is a case-sensitive substring match.
pub fn default_rules(spam_keywords: &[String]) -> Vec<AlertRule> {
    let keywords = spam_keywords.to_vec();
    vec![
        AlertRule::new("Block Empty Messages", |alert| !alert.payload.message.is_empty()),
        AlertRule::new("Block Spam Keywords", move |alert| {
            !keywords.iter().any(|keyword| alert.payload.message.contains(keyword.as_str()))
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::AlertBuilder;

    fn engine_with_defaults() -> RuleEngine {
        let engine = RuleEngine::new(Duration::from_secs(30));
        for rule in default_rules(&["viagra".to_string(), "casino".to_string()]) {
            engine.add_rule(rule);
        }
        engine
    }

    #[test]
    fn accepts_a_plain_alert() {
        let engine = engine_with_defaults();
        let alert = AlertBuilder::new().message("deploy finished").build();
        assert_eq!(engine.evaluate(&alert), Verdict::Allowed);
    }

    #[test]
    fn rejects_duplicates_first() {
        let engine = engine_with_defaults();
        let alert = AlertBuilder::new().message("deploy finished").build();

        assert!(engine.evaluate(&alert).is_allowed());
        assert_eq!(
            engine.evaluate(&alert),
            Verdict::Rejected("duplicate alert filtered".to_string())
        );
    }

    #[test]
    fn rejects_empty_messages() {
        let engine = engine_with_defaults();
        let alert = AlertBuilder::new().message("").build();
        assert_eq!(
            engine.evaluate(&alert),
            Verdict::Rejected("filtered by rule: Block Empty Messages".to_string())
        );
    }

    #[test]
    fn rejects_spam_keywords() {
        let engine = engine_with_defaults();
        let alert = AlertBuilder::new().message("cheap casino chips").build();
        assert_eq!(
            engine.evaluate(&alert),
            Verdict::Rejected("filtered by rule: Block Spam Keywords".to_string())
        );
    }

    #[test]
    fn spam_keyword_match_is_case_sensitive() {
        let engine = engine_with_defaults();
        let alert = AlertBuilder::new().message("CASINO night").build();
        assert!(engine.evaluate(&alert).is_allowed());
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let engine = RuleEngine::new(Duration::from_secs(30));
        let mut rule = AlertRule::new("Block Everything", |_| false);
        rule.enabled = false;
        engine.add_rule(rule);

        let alert = AlertBuilder::new().message("anything").build();
        assert!(engine.evaluate(&alert).is_allowed());
    }

    #[test]
    fn custom_rules_run_in_registration_order() {
        let engine = RuleEngine::new(Duration::from_secs(30));
        engine.add_rule(AlertRule::new("first", |_| false));
        engine.add_rule(AlertRule::new("second", |_| false));

        let alert = AlertBuilder::new().message("anything").build();
        assert_eq!(
            engine.evaluate(&alert),
            Verdict::Rejected("filtered by rule: first".to_string())
        );
    }

    #[test]
    fn throttle_rejection_reported_as_rate_limit() {
        let engine = RuleEngine::new(Duration::from_secs(30));
        let ceiling = crate::models::Priority::Low.throttle_ceiling();

        for n in 0..ceiling {
            let alert = AlertBuilder::new()
                .priority(crate::models::Priority::Low)
                .message(format!("event {n}"))
                .build();
            assert!(engine.evaluate(&alert).is_allowed());
        }

        let alert = AlertBuilder::new()
            .priority(crate::models::Priority::Low)
            .message("one too many")
            .build();
        assert_eq!(engine.evaluate(&alert), Verdict::Rejected("rate limit exceeded".to_string()));
    }
}
